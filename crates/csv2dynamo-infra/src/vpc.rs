//! Network layout for the container stack.
//!
//! One public and one private subnet per availability zone. Public subnets
//! route through an internet gateway; private subnets share the NAT gateways
//! round-robin.

use serde_json::{json, Value};

use crate::error::Result;
use crate::intrinsics::{cidr, get_att, get_azs, reference, select};
use crate::stack::Stack;
use crate::template::Resource;

/// Subnet prefix length carved out of the VPC block
const SUBNET_CIDR_BITS: u8 = 12;

#[derive(Debug, Clone)]
pub struct VpcProps {
    pub cidr: String,
    /// Zones are picked by position from `Fn::GetAZs`; a region-agnostic
    /// template can only rely on two of them existing.
    pub max_azs: usize,
    pub nat_gateways: usize,
}

impl Default for VpcProps {
    fn default() -> Self {
        Self {
            cidr: "10.0.0.0/16".to_string(),
            max_azs: 2,
            nat_gateways: 1,
        }
    }
}

/// References to the pieces other resources attach to
#[derive(Debug, Clone)]
pub struct VpcRefs {
    pub vpc_id: Value,
    pub public_subnets: Vec<Value>,
    pub private_subnets: Vec<Value>,
    /// Logical ids of the private default routes; services placed in private
    /// subnets must wait for them
    pub private_routes: Vec<String>,
}

pub fn add_vpc(stack: &mut Stack, id: &str, props: &VpcProps) -> Result<VpcRefs> {
    let name_tag = format!("{}/{}", stack.name(), id);
    let vpc_id = stack.add_resource(
        id,
        Resource::new(
            "AWS::EC2::VPC",
            json!({
                "CidrBlock": props.cidr,
                "EnableDnsHostnames": true,
                "EnableDnsSupport": true,
                "InstanceTenancy": "default",
                "Tags": [{ "Key": "Name", "Value": name_tag }],
            }),
        ),
    )?;

    let igw_id = format!("{}IGW", id);
    let attachment_id = format!("{}VPCGW", id);
    let igw = stack.add_resource(&igw_id, Resource::new("AWS::EC2::InternetGateway", json!({})))?;
    stack.add_resource(
        &attachment_id,
        Resource::new(
            "AWS::EC2::VPCGatewayAttachment",
            json!({ "VpcId": vpc_id, "InternetGatewayId": igw }),
        ),
    )?;

    let subnet_blocks = cidr(
        get_att(id, "CidrBlock"),
        props.max_azs * 2,
        SUBNET_CIDR_BITS,
    );

    let mut public_subnets = Vec::with_capacity(props.max_azs);
    for az in 0..props.max_azs {
        let prefix = format!("{}PublicSubnet{}", id, az + 1);
        let subnet = add_subnet(stack, &prefix, &vpc_id, az, select(az, subnet_blocks.clone()), true)?;
        let route_table = add_route_table(stack, &prefix, &vpc_id, &subnet)?;
        stack.add_resource(
            &format!("{}DefaultRoute", prefix),
            Resource::new(
                "AWS::EC2::Route",
                json!({
                    "RouteTableId": route_table,
                    "DestinationCidrBlock": "0.0.0.0/0",
                    "GatewayId": reference(&igw_id),
                }),
            )
            .depends_on(&attachment_id),
        )?;
        public_subnets.push(subnet);
    }

    let nat_count = props.nat_gateways.clamp(1, props.max_azs.max(1));
    let mut nat_gateways = Vec::with_capacity(nat_count);
    for (idx, subnet) in public_subnets.iter().take(nat_count).enumerate() {
        let prefix = format!("{}PublicSubnet{}", id, idx + 1);
        let eip_id = format!("{}EIP", prefix);
        stack.add_resource(
            &eip_id,
            Resource::new("AWS::EC2::EIP", json!({ "Domain": "vpc" })).depends_on(&attachment_id),
        )?;
        let nat = stack.add_resource(
            &format!("{}NATGateway", prefix),
            Resource::new(
                "AWS::EC2::NatGateway",
                json!({
                    "SubnetId": subnet,
                    "AllocationId": get_att(&eip_id, "AllocationId"),
                }),
            ),
        )?;
        nat_gateways.push(nat);
    }

    let mut private_subnets = Vec::with_capacity(props.max_azs);
    let mut private_routes = Vec::with_capacity(props.max_azs);
    for az in 0..props.max_azs {
        let prefix = format!("{}PrivateSubnet{}", id, az + 1);
        let block = select(props.max_azs + az, subnet_blocks.clone());
        let subnet = add_subnet(stack, &prefix, &vpc_id, az, block, false)?;
        let route_table = add_route_table(stack, &prefix, &vpc_id, &subnet)?;
        let route_id = format!("{}DefaultRoute", prefix);
        stack.add_resource(
            &route_id,
            Resource::new(
                "AWS::EC2::Route",
                json!({
                    "RouteTableId": route_table,
                    "DestinationCidrBlock": "0.0.0.0/0",
                    "NatGatewayId": nat_gateways[az % nat_gateways.len()],
                }),
            ),
        )?;
        private_subnets.push(subnet);
        private_routes.push(route_id);
    }

    Ok(VpcRefs {
        vpc_id,
        public_subnets,
        private_subnets,
        private_routes,
    })
}

fn add_subnet(
    stack: &mut Stack,
    prefix: &str,
    vpc_id: &Value,
    az: usize,
    cidr_block: Value,
    public: bool,
) -> Result<Value> {
    let kind = if public { "Public" } else { "Private" };
    stack.add_resource(
        &format!("{}Subnet", prefix),
        Resource::new(
            "AWS::EC2::Subnet",
            json!({
                "VpcId": vpc_id,
                "AvailabilityZone": select(az, get_azs()),
                "CidrBlock": cidr_block,
                "MapPublicIpOnLaunch": public,
                "Tags": [{ "Key": "aws-cdk:subnet-type", "Value": kind }],
            }),
        ),
    )
}

fn add_route_table(stack: &mut Stack, prefix: &str, vpc_id: &Value, subnet: &Value) -> Result<Value> {
    let route_table = stack.add_resource(
        &format!("{}RouteTable", prefix),
        Resource::new("AWS::EC2::RouteTable", json!({ "VpcId": vpc_id })),
    )?;
    stack.add_resource(
        &format!("{}RouteTableAssociation", prefix),
        Resource::new(
            "AWS::EC2::SubnetRouteTableAssociation",
            json!({ "RouteTableId": route_table, "SubnetId": subnet }),
        ),
    )?;
    Ok(route_table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_spans_two_zones_with_one_nat() {
        let mut stack = Stack::new("net", "test");
        let refs = add_vpc(&mut stack, "Vpc", &VpcProps::default()).unwrap();

        assert_eq!(refs.public_subnets.len(), 2);
        assert_eq!(refs.private_subnets.len(), 2);
        let template = stack.template();
        assert_eq!(template.resources_of_type("AWS::EC2::Subnet").count(), 4);
        assert_eq!(template.resources_of_type("AWS::EC2::NatGateway").count(), 1);
        assert_eq!(
            template.resource("Vpc").unwrap().properties["CidrBlock"],
            "10.0.0.0/16"
        );
    }

    #[test]
    fn test_default_layout_only_selects_first_two_zones() {
        let mut stack = Stack::new("net", "test");
        add_vpc(&mut stack, "Vpc", &VpcProps::default()).unwrap();

        let template = stack.template();
        let mut zones: Vec<Value> = template
            .resources_of_type("AWS::EC2::Subnet")
            .map(|id| {
                let subnet = template.resource(id).unwrap();
                subnet.properties["AvailabilityZone"]["Fn::Select"][0].clone()
            })
            .collect();
        zones.sort_by_key(|zone| zone.as_u64());
        zones.dedup();
        assert_eq!(zones, vec![json!(0), json!(1)]);
    }

    #[test]
    fn test_zone_count_is_configurable() {
        let mut stack = Stack::new("net", "test");
        let props = VpcProps {
            max_azs: 3,
            ..VpcProps::default()
        };
        let refs = add_vpc(&mut stack, "Vpc", &props).unwrap();

        assert_eq!(refs.private_subnets.len(), 3);
        let subnet = stack.template().resource("VpcPrivateSubnet3Subnet").unwrap();
        assert_eq!(
            subnet.properties["AvailabilityZone"],
            json!({ "Fn::Select": [2, { "Fn::GetAZs": "" }] })
        );
    }

    #[test]
    fn test_private_routes_share_the_nat_gateway() {
        let mut stack = Stack::new("net", "test");
        let refs = add_vpc(&mut stack, "Vpc", &VpcProps::default()).unwrap();

        for route in &refs.private_routes {
            let route = stack.template().resource(route).unwrap();
            assert_eq!(
                route.properties["NatGatewayId"],
                json!({ "Ref": "VpcPublicSubnet1NATGateway" })
            );
        }
    }

    #[test]
    fn test_public_routes_wait_for_gateway_attachment() {
        let mut stack = Stack::new("net", "test");
        add_vpc(&mut stack, "Vpc", &VpcProps::default()).unwrap();

        let route = stack.template().resource("VpcPublicSubnet2DefaultRoute").unwrap();
        assert_eq!(route.depends_on, vec!["VpcVPCGW".to_string()]);
        assert_eq!(route.properties["GatewayId"], json!({ "Ref": "VpcIGW" }));
    }
}
