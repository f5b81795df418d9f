//! EC2 Overrides
//!
//! Sockets derived from gateway and VPC id props, tagged so the auto-wiring
//! engine can suggest connections from the components that output those ids.
//!
//! - **AWS::EC2::Route**: `GatewayId` accepts internet and VPN gateway ids
//! - **AWS::EC2::VPCGatewayAttachment**: `VpcId`, `InternetGatewayId` and
//!   `VpnGatewayId` sockets

use crate::models::IngestedSchema;
use crate::services::override_registry::{OverrideError, OverrideRegistry};
use crate::services::schema_transform::{materialize_socket, SocketMaterialization};

pub const ROUTE_SCHEMA_ID: &str = "AWS::EC2::Route";
pub const VPC_GATEWAY_ATTACHMENT_SCHEMA_ID: &str = "AWS::EC2::VPCGatewayAttachment";

pub const INTERNET_GATEWAY_TOKEN: &str = "InternetGatewayId";
pub const VPN_GATEWAY_TOKEN: &str = "VPNGatewayId";
pub const VPC_TOKEN: &str = "VpcId";

pub fn register_overrides(registry: &mut OverrideRegistry) {
    registry.register(ROUTE_SCHEMA_ID, "route_gateway_socket", route_gateway_socket);
    registry.register(
        VPC_GATEWAY_ATTACHMENT_SCHEMA_ID,
        "gateway_attachment_sockets",
        gateway_attachment_sockets,
    );
}

/// A route's gateway may be an internet gateway or a VPN gateway
fn route_gateway_socket(schema: &IngestedSchema) -> Result<IngestedSchema, OverrideError> {
    let mut schema = schema.clone();
    materialize_socket(
        &mut schema,
        &SocketMaterialization::input("GatewayId")
            .with_annotation(INTERNET_GATEWAY_TOKEN)
            .with_annotation(VPN_GATEWAY_TOKEN),
    )?;
    Ok(schema)
}

fn gateway_attachment_sockets(schema: &IngestedSchema) -> Result<IngestedSchema, OverrideError> {
    let mut schema = schema.clone();
    for (prop, token) in [
        ("VpcId", VPC_TOKEN),
        ("InternetGatewayId", INTERNET_GATEWAY_TOKEN),
        ("VpnGatewayId", VPN_GATEWAY_TOKEN),
    ] {
        materialize_socket(
            &mut schema,
            &SocketMaterialization::input(prop).with_annotation(token),
        )?;
    }
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PropSpec, SocketKind};

    #[test]
    fn test_route_gets_tagged_gateway_socket() {
        let schema = IngestedSchema::new(ROUTE_SCHEMA_ID)
            .with_domain_prop(PropSpec::string("GatewayId"))
            .with_domain_prop(PropSpec::string("RouteTableId"));

        let enriched = route_gateway_socket(&schema).unwrap();
        let socket = enriched.socket("GatewayId").unwrap();
        assert_eq!(socket.kind, SocketKind::Input);
        assert!(socket.annotations.contains(INTERNET_GATEWAY_TOKEN));
        assert!(socket.annotations.contains(VPN_GATEWAY_TOKEN));
        assert_eq!(
            socket.prop_path,
            Some(vec!["domain".to_string(), "GatewayId".to_string()])
        );
        // the prop stays in the domain tree
        assert!(enriched.domain.child("GatewayId").is_some());
    }

    #[test]
    fn test_attachment_without_vpn_gateway_is_skipped_whole() {
        let schema = IngestedSchema::new(VPC_GATEWAY_ATTACHMENT_SCHEMA_ID)
            .with_domain_prop(PropSpec::string("VpcId"))
            .with_domain_prop(PropSpec::string("InternetGatewayId"));

        let err = gateway_attachment_sockets(&schema).unwrap_err();
        assert!(matches!(err, OverrideError::InvalidOverrideTarget { .. }));
        // the caller still holds the untouched input
        assert!(schema.sockets.is_empty());
    }
}
