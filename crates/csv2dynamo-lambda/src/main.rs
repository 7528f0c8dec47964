// AWS Lambda binary entry point
//
// Build with: cargo build -p csv2dynamo-lambda --release
// The resulting `bootstrap` binary is what the provided.al2023 runtime executes.

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    csv2dynamo_lambda::run().await
}
