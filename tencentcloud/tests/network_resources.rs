mod common;

use common::*;
use mockito::{Matcher, Server};
use serde_json::json;
use serial_test::serial;
use tfplug::types::DynamicValue;

fn eni_json(state: &str, instance_id: Option<&str>) -> serde_json::Value {
    let mut eni = json!({
        "NetworkInterfaceId": "eni-1",
        "NetworkInterfaceName": "demo",
        "VpcId": "vpc-1",
        "SubnetId": "subnet-1",
        "State": state,
        "PrivateIpAddressSet": [{"PrivateIpAddress": "10.0.0.5", "Primary": true}]
    });
    if let Some(instance_id) = instance_id {
        eni["Attachment"] = json!({"InstanceId": instance_id, "DeviceIndex": 1});
    }
    json!({"NetworkInterfaceSet": [eni], "TotalCount": 1, "RequestId": "req-eni"})
}

fn address_set(name: &str, status: &str, bound_to_eni: bool) -> serde_json::Value {
    let mut address = json!({
        "AddressId": "eip-1",
        "AddressName": name,
        "AddressIp": "1.1.1.1",
        "AddressStatus": status,
        "AddressType": "EIP",
        "InternetChargeType": "TRAFFIC_POSTPAID_BY_HOUR",
        "InternetServiceProvider": "BGP",
        "Bandwidth": 10,
        "CreatedTime": "2024-01-01 00:00:00",
        "TagSet": [{"Key": "env", "Value": "test"}]
    });
    if bound_to_eni {
        address["NetworkInterfaceId"] = json!("eni-1");
        address["PrivateAddressIp"] = json!("10.0.0.5");
    }
    json!({"AddressSet": [address], "TotalCount": 1, "RequestId": "req-eip"})
}

fn acl_json(subnets: &[&str]) -> serde_json::Value {
    let subnet_set: Vec<serde_json::Value> =
        subnets.iter().map(|id| json!({"SubnetId": id})).collect();
    json!({
        "NetworkAclId": "acl-1",
        "NetworkAclName": "demo",
        "VpcId": "vpc-1",
        "CreatedTime": "2024-01-01 00:00:00",
        "SubnetSet": subnet_set,
        "IngressEntries": [{"Protocol": "tcp", "Port": "80", "CidrBlock": "10.0.0.0/16", "Action": "ACCEPT"}],
        "EgressEntries": [],
        "TagSet": []
    })
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn eni_attachment_waits_for_binding_then_detaches() {
    let mut server = Server::new_async().await;
    let attach_call = server
        .mock("POST", "/")
        .match_header("x-tc-action", "AttachNetworkInterface")
        .match_body(Matcher::Json(json!({"NetworkInterfaceId": "eni-1", "InstanceId": "ins-1"})))
        .with_body(json!({"Response": {"RequestId": "req-1"}}).to_string())
        .expect(1)
        .create_async()
        .await;
    let _attaching = mock_times(&mut server, "DescribeNetworkInterfaces", 1, eni_json("ATTACHING", None)).await;
    let _attached = mock_times(&mut server, "DescribeNetworkInterfaces", 2, eni_json("AVAILABLE", Some("ins-1"))).await;
    let detach_call = mock_times(&mut server, "DetachNetworkInterface", 1, json!({"RequestId": "req-2"})).await;
    let _detaching = mock_times(&mut server, "DescribeNetworkInterfaces", 1, eni_json("DETACHING", Some("ins-1"))).await;
    let _free = mock_times(&mut server, "DescribeNetworkInterfaces", 1, eni_json("AVAILABLE", None)).await;

    let provider_data = provider_data(&server);
    let attachment = resource(&provider_data, "tencentcloud_eni_attachment").await;

    let mut planned = DynamicValue::empty_object();
    planned.set_string(&path("eni_id"), "eni-1").unwrap();
    planned.set_string(&path("instance_id"), "ins-1").unwrap();

    let created = create(attachment.as_ref(), "tencentcloud_eni_attachment", planned).await;
    assert!(created.diagnostics.is_empty(), "{:?}", details(&created.diagnostics));
    assert_eq!(created.new_state.get_string_opt(&path("id")).as_deref(), Some("eni-1"));

    let deleted = delete(attachment.as_ref(), "tencentcloud_eni_attachment", created.new_state).await;
    assert!(deleted.diagnostics.is_empty(), "{:?}", details(&deleted.diagnostics));

    attach_call.assert_async().await;
    detach_call.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn eni_attachment_read_drops_unbound_eni() {
    let mut server = Server::new_async().await;
    let _free = mock_action(&mut server, "DescribeNetworkInterfaces", eni_json("AVAILABLE", None)).await;

    let provider_data = provider_data(&server);
    let attachment = resource(&provider_data, "tencentcloud_eni_attachment").await;

    let mut current = with_id("eni-1");
    current.set_string(&path("instance_id"), "ins-1").unwrap();
    let read = read(attachment.as_ref(), "tencentcloud_eni_attachment", current).await;
    assert!(read.diagnostics.is_empty());
    assert!(read.new_state.is_none());
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn eip_allocate_rename_and_release() {
    let mut server = Server::new_async().await;
    let allocate_call = server
        .mock("POST", "/")
        .match_header("x-tc-action", "AllocateAddresses")
        .match_body(Matcher::Json(json!({
            "AddressName": "demo",
            "InternetMaxBandwidthOut": 10,
            "Tags": [{"Key": "env", "Value": "test"}]
        })))
        .with_body(json!({"Response": {"AddressSet": ["eip-1"], "RequestId": "req-1"}}).to_string())
        .expect(1)
        .create_async()
        .await;
    let rename_call = server
        .mock("POST", "/")
        .match_header("x-tc-action", "ModifyAddressAttribute")
        .match_body(Matcher::Json(json!({"AddressId": "eip-1", "AddressName": "renamed"})))
        .with_body(json!({"Response": {"RequestId": "req-2"}}).to_string())
        .expect(1)
        .create_async()
        .await;
    let tag_call = server
        .mock("POST", "/")
        .match_header("x-tc-action", "ModifyResourceTags")
        .match_body(Matcher::PartialJson(json!({
            "Resource": "qcs::cvm:ap-guangzhou:uin/:eip/eip-1",
            "ReplaceTags": [{"TagKey": "env", "TagValue": "prod"}]
        })))
        .with_body(json!({"Response": {"RequestId": "req-3"}}).to_string())
        .expect(1)
        .create_async()
        .await;
    let unbind_call = mock_times(&mut server, "DisassociateAddress", 0, json!({"RequestId": "req-4"})).await;
    let release_call = server
        .mock("POST", "/")
        .match_header("x-tc-action", "ReleaseAddresses")
        .match_body(Matcher::Json(json!({"AddressIds": ["eip-1"]})))
        .with_body(json!({"Response": {"RequestId": "req-5"}}).to_string())
        .expect(1)
        .create_async()
        .await;
    let _creating = mock_times(&mut server, "DescribeAddresses", 1, address_set("demo", "CREATING", false)).await;
    let _created = mock_times(&mut server, "DescribeAddresses", 2, address_set("demo", "UNBIND", false)).await;
    let _renamed = mock_times(&mut server, "DescribeAddresses", 2, address_set("renamed", "UNBIND", false)).await;
    let _gone = mock_times(
        &mut server,
        "DescribeAddresses",
        1,
        json!({"AddressSet": [], "TotalCount": 0, "RequestId": "req-6"}),
    )
    .await;

    let provider_data = provider_data(&server);
    let eip = resource(&provider_data, "tencentcloud_eip").await;

    let mut planned = DynamicValue::empty_object();
    planned.set_string(&path("name"), "demo").unwrap();
    planned.set_i64(&path("internet_max_bandwidth_out"), 10).unwrap();
    planned
        .set_string_map(&path("tags"), [("env", "test")])
        .unwrap();

    let created = create(eip.as_ref(), "tencentcloud_eip", planned).await;
    assert!(created.diagnostics.is_empty(), "{:?}", details(&created.diagnostics));
    let state = created.new_state;
    assert_eq!(state.get_string_opt(&path("id")).as_deref(), Some("eip-1"));
    assert_eq!(state.get_string_opt(&path("public_ip")).as_deref(), Some("1.1.1.1"));
    assert_eq!(state.get_string_opt(&path("status")).as_deref(), Some("UNBIND"));

    let mut planned = state.clone();
    planned.set_string(&path("name"), "renamed").unwrap();
    planned
        .set_string_map(&path("tags"), [("env", "prod")])
        .unwrap();
    let updated = update(eip.as_ref(), "tencentcloud_eip", state, planned).await;
    assert!(updated.diagnostics.is_empty(), "{:?}", details(&updated.diagnostics));
    assert_eq!(updated.new_state.get_string_opt(&path("name")).as_deref(), Some("renamed"));

    let deleted = delete(eip.as_ref(), "tencentcloud_eip", updated.new_state).await;
    assert!(deleted.diagnostics.is_empty(), "{:?}", details(&deleted.diagnostics));

    allocate_call.assert_async().await;
    rename_call.assert_async().await;
    tag_call.assert_async().await;
    unbind_call.assert_async().await;
    release_call.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn eip_association_binds_eni_private_ip() {
    let mut server = Server::new_async().await;
    let bind_call = server
        .mock("POST", "/")
        .match_header("x-tc-action", "AssociateAddress")
        .match_body(Matcher::Json(json!({
            "AddressId": "eip-1",
            "NetworkInterfaceId": "eni-1",
            "PrivateIpAddress": "10.0.0.5"
        })))
        .with_body(json!({"Response": {"RequestId": "req-1"}}).to_string())
        .expect(1)
        .create_async()
        .await;
    let unbind_call = server
        .mock("POST", "/")
        .match_header("x-tc-action", "DisassociateAddress")
        .match_body(Matcher::Json(json!({"AddressId": "eip-1"})))
        .with_body(json!({"Response": {"RequestId": "req-2"}}).to_string())
        .expect(1)
        .create_async()
        .await;
    let _binding = mock_times(&mut server, "DescribeAddresses", 1, address_set("demo", "BINDING", false)).await;
    let _bound = mock_times(&mut server, "DescribeAddresses", 4, address_set("demo", "BIND_ENI", true)).await;
    let _unbound = mock_times(&mut server, "DescribeAddresses", 1, address_set("demo", "UNBIND", false)).await;

    let provider_data = provider_data(&server);
    let association = resource(&provider_data, "tencentcloud_eip_association").await;

    let mut planned = DynamicValue::empty_object();
    planned.set_string(&path("eip_id"), "eip-1").unwrap();
    planned
        .set_string(&path("network_interface_id"), "eni-1")
        .unwrap();
    planned.set_string(&path("private_ip"), "10.0.0.5").unwrap();

    let created = create(association.as_ref(), "tencentcloud_eip_association", planned).await;
    assert!(created.diagnostics.is_empty(), "{:?}", details(&created.diagnostics));
    assert_eq!(
        created.new_state.get_string_opt(&path("id")).as_deref(),
        Some("eip-1#eni-1#10.0.0.5")
    );
    assert_eq!(created.new_state.get_string_opt(&path("instance_id")), None);

    let deleted = delete(association.as_ref(), "tencentcloud_eip_association", created.new_state).await;
    assert!(deleted.diagnostics.is_empty(), "{:?}", details(&deleted.diagnostics));

    bind_call.assert_async().await;
    unbind_call.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn vpc_acl_create_writes_rules_and_reads_them_back() {
    let mut server = Server::new_async().await;
    let create_call = server
        .mock("POST", "/")
        .match_header("x-tc-action", "CreateNetworkAcl")
        .match_body(Matcher::Json(json!({"VpcId": "vpc-1", "NetworkAclName": "demo"})))
        .with_body(json!({"Response": {"NetworkAcl": acl_json(&[]), "RequestId": "req-1"}}).to_string())
        .expect(1)
        .create_async()
        .await;
    let entries_call = server
        .mock("POST", "/")
        .match_header("x-tc-action", "ModifyNetworkAclEntries")
        .match_body(Matcher::Json(json!({
            "NetworkAclId": "acl-1",
            "NetworkAclEntrySet": {
                "Ingress": [{"Protocol": "TCP", "Port": "80", "CidrBlock": "10.0.0.0/16", "Action": "ACCEPT"}],
                "Egress": []
            }
        })))
        .with_body(json!({"Response": {"RequestId": "req-2"}}).to_string())
        .expect(1)
        .create_async()
        .await;
    let _describe = mock_action(
        &mut server,
        "DescribeNetworkAcls",
        json!({"NetworkAclSet": [acl_json(&[])], "TotalCount": 1, "RequestId": "req-3"}),
    )
    .await;
    let unbind_call = mock_times(&mut server, "DisassociateNetworkAclSubnets", 0, json!({"RequestId": "req-4"})).await;
    let delete_call = mock_times(&mut server, "DeleteNetworkAcl", 1, json!({"RequestId": "req-5"})).await;

    let provider_data = provider_data(&server);
    let acl = resource(&provider_data, "tencentcloud_vpc_acl").await;

    let mut planned = DynamicValue::empty_object();
    planned.set_string(&path("vpc_id"), "vpc-1").unwrap();
    planned.set_string(&path("name"), "demo").unwrap();
    planned
        .set_string_list(&path("ingress"), vec!["ACCEPT#10.0.0.0/16#80#TCP".to_string()])
        .unwrap();

    let created = create(acl.as_ref(), "tencentcloud_vpc_acl", planned).await;
    assert!(created.diagnostics.is_empty(), "{:?}", details(&created.diagnostics));
    let state = created.new_state;
    assert_eq!(state.get_string_opt(&path("id")).as_deref(), Some("acl-1"));
    assert_eq!(
        state.get_string_list(&path("ingress")),
        vec!["ACCEPT#10.0.0.0/16#80#TCP".to_string()]
    );
    assert!(state.get_string_list(&path("egress")).is_empty());

    let deleted = delete(acl.as_ref(), "tencentcloud_vpc_acl", state).await;
    assert!(deleted.diagnostics.is_empty(), "{:?}", details(&deleted.diagnostics));

    create_call.assert_async().await;
    entries_call.assert_async().await;
    unbind_call.assert_async().await;
    delete_call.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn vpc_acl_rejects_malformed_rule_before_creating() {
    let mut server = Server::new_async().await;
    let create_call = mock_times(&mut server, "CreateNetworkAcl", 0, json!({"RequestId": "req-1"})).await;

    let provider_data = provider_data(&server);
    let acl = resource(&provider_data, "tencentcloud_vpc_acl").await;

    let mut planned = DynamicValue::empty_object();
    planned.set_string(&path("vpc_id"), "vpc-1").unwrap();
    planned.set_string(&path("name"), "demo").unwrap();
    planned
        .set_string_list(&path("egress"), vec!["ACCEPT#10.0.0.0/16#80#ICMP".to_string()])
        .unwrap();

    let created = create(acl.as_ref(), "tencentcloud_vpc_acl", planned).await;
    assert_eq!(created.diagnostics.len(), 1);
    assert_eq!(created.diagnostics[0].summary, "Invalid acl rule");
    create_call.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn vpc_acl_attachment_tracks_bound_subnets() {
    let mut server = Server::new_async().await;
    let bind_call = server
        .mock("POST", "/")
        .match_header("x-tc-action", "AssociateNetworkAclSubnets")
        .match_body(Matcher::Json(json!({"NetworkAclId": "acl-1", "SubnetIds": ["subnet-1", "subnet-2"]})))
        .with_body(json!({"Response": {"RequestId": "req-1"}}).to_string())
        .expect(1)
        .create_async()
        .await;
    let unbind_call = server
        .mock("POST", "/")
        .match_header("x-tc-action", "DisassociateNetworkAclSubnets")
        .match_body(Matcher::Json(json!({"NetworkAclId": "acl-1", "SubnetIds": ["subnet-1", "subnet-2"]})))
        .with_body(json!({"Response": {"RequestId": "req-2"}}).to_string())
        .expect(1)
        .create_async()
        .await;
    let _both = mock_times(
        &mut server,
        "DescribeNetworkAcls",
        1,
        json!({"NetworkAclSet": [acl_json(&["subnet-1", "subnet-2"])], "TotalCount": 1, "RequestId": "req-3"}),
    )
    .await;
    let _one = mock_times(
        &mut server,
        "DescribeNetworkAcls",
        1,
        json!({"NetworkAclSet": [acl_json(&["subnet-1"])], "TotalCount": 1, "RequestId": "req-4"}),
    )
    .await;

    let provider_data = provider_data(&server);
    let attachment = resource(&provider_data, "tencentcloud_vpc_acl_attachment").await;

    let mut planned = DynamicValue::empty_object();
    planned.set_string(&path("acl_id"), "acl-1").unwrap();
    planned
        .set_string_list(
            &path("subnet_ids"),
            vec!["subnet-1".to_string(), "subnet-2".to_string()],
        )
        .unwrap();

    let created = create(attachment.as_ref(), "tencentcloud_vpc_acl_attachment", planned).await;
    assert!(created.diagnostics.is_empty(), "{:?}", details(&created.diagnostics));
    assert_eq!(
        created.new_state.get_string_opt(&path("id")).as_deref(),
        Some("acl-1#subnet-1#subnet-2")
    );

    let read = read(attachment.as_ref(), "tencentcloud_vpc_acl_attachment", created.new_state.clone()).await;
    let current = read.new_state.expect("attachment still present");
    assert_eq!(current.get_string_list(&path("subnet_ids")), vec!["subnet-1".to_string()]);

    let deleted = delete(attachment.as_ref(), "tencentcloud_vpc_acl_attachment", created.new_state).await;
    assert!(deleted.diagnostics.is_empty(), "{:?}", details(&deleted.diagnostics));

    bind_call.assert_async().await;
    unbind_call.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn lite_rules_replace_group_policies() {
    let mut server = Server::new_async().await;
    let policy_set = json!({
        "Ingress": [{"Protocol": "TCP", "Port": "22", "CidrBlock": "10.0.0.0/8", "Action": "ACCEPT"}],
        "Egress": [{"Protocol": "ALL", "CidrBlock": "0.0.0.0/0", "Action": "DROP"}]
    });
    let replace_call = server
        .mock("POST", "/")
        .match_header("x-tc-action", "ModifySecurityGroupPolicies")
        .match_body(Matcher::Json(json!({"SecurityGroupId": "sg-1", "SecurityGroupPolicySet": policy_set})))
        .with_body(json!({"Response": {"RequestId": "req-1"}}).to_string())
        .expect(1)
        .create_async()
        .await;
    let _policies = mock_action(
        &mut server,
        "DescribeSecurityGroupPolicies",
        json!({
            "SecurityGroupPolicySet": {
                "Ingress": [
                    {"Protocol": "tcp", "Port": "22", "CidrBlock": "10.0.0.0/8", "Action": "ACCEPT"},
                    {"Protocol": "ALL", "SecurityGroupId": "sg-2", "Action": "ACCEPT"}
                ],
                "Egress": [{"Protocol": "ALL", "Port": "ALL", "CidrBlock": "0.0.0.0/0", "Action": "DROP"}]
            },
            "RequestId": "req-2"
        }),
    )
    .await;
    let delete_call = server
        .mock("POST", "/")
        .match_header("x-tc-action", "DeleteSecurityGroupPolicies")
        .match_body(Matcher::Json(json!({"SecurityGroupId": "sg-1", "SecurityGroupPolicySet": policy_set})))
        .with_body(json!({"Response": {"RequestId": "req-3"}}).to_string())
        .expect(1)
        .create_async()
        .await;

    let provider_data = provider_data(&server);
    let lite_rule = resource(&provider_data, "tencentcloud_security_group_lite_rule").await;

    let mut planned = DynamicValue::empty_object();
    planned.set_string(&path("security_group_id"), "sg-1").unwrap();
    planned
        .set_string_list(&path("ingress"), vec!["ACCEPT#10.0.0.0/8#22#TCP".to_string()])
        .unwrap();
    planned
        .set_string_list(&path("egress"), vec!["DROP#0.0.0.0/0#ALL#ALL".to_string()])
        .unwrap();

    let created = create(lite_rule.as_ref(), "tencentcloud_security_group_lite_rule", planned).await;
    assert!(created.diagnostics.is_empty(), "{:?}", details(&created.diagnostics));
    let state = created.new_state;
    assert_eq!(state.get_string_opt(&path("id")).as_deref(), Some("sg-1"));
    assert_eq!(
        state.get_string_list(&path("ingress")),
        vec!["ACCEPT#10.0.0.0/8#22#TCP".to_string()]
    );
    assert_eq!(
        state.get_string_list(&path("egress")),
        vec!["DROP#0.0.0.0/0#ALL#ALL".to_string()]
    );

    let deleted = delete(lite_rule.as_ref(), "tencentcloud_security_group_lite_rule", state).await;
    assert!(deleted.diagnostics.is_empty(), "{:?}", details(&deleted.diagnostics));

    replace_call.assert_async().await;
    delete_call.assert_async().await;
}
