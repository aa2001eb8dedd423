//! Resource implementations

pub(crate) mod common;

pub mod resource_eip;
pub mod resource_eip_association;
pub mod resource_eni;
pub mod resource_eni_attachment;
pub mod resource_ha_vip;
pub mod resource_ha_vip_eip_attachment;
pub mod resource_nat_gateway;
pub mod resource_route_table;
pub mod resource_route_table_entry;
pub mod resource_security_group;
pub mod resource_security_group_lite_rule;
pub mod resource_security_group_rule;
pub mod resource_subnet;
pub mod resource_vpc;
pub mod resource_vpc_acl;
pub mod resource_vpc_acl_attachment;
pub mod resource_vpc_bandwidth_package;
pub mod resource_vpc_bandwidth_package_attachment;
pub mod resource_vpc_network_acl_quintuple;
pub mod resource_vpc_private_nat_gateway_translation_nat_rule;

pub use resource_eip::EipResource;
pub use resource_eip_association::EipAssociationResource;
pub use resource_eni::EniResource;
pub use resource_eni_attachment::EniAttachmentResource;
pub use resource_ha_vip::HaVipResource;
pub use resource_ha_vip_eip_attachment::HaVipEipAttachmentResource;
pub use resource_nat_gateway::NatGatewayResource;
pub use resource_route_table::RouteTableResource;
pub use resource_route_table_entry::RouteTableEntryResource;
pub use resource_security_group::SecurityGroupResource;
pub use resource_security_group_lite_rule::SecurityGroupLiteRuleResource;
pub use resource_security_group_rule::SecurityGroupRuleResource;
pub use resource_subnet::SubnetResource;
pub use resource_vpc::VpcResource;
pub use resource_vpc_acl::VpcAclResource;
pub use resource_vpc_acl_attachment::VpcAclAttachmentResource;
pub use resource_vpc_bandwidth_package::VpcBandwidthPackageResource;
pub use resource_vpc_bandwidth_package_attachment::VpcBandwidthPackageAttachmentResource;
pub use resource_vpc_network_acl_quintuple::VpcNetworkAclQuintupleResource;
pub use resource_vpc_private_nat_gateway_translation_nat_rule::VpcPrivateNatGatewayTranslationNatRuleResource;
