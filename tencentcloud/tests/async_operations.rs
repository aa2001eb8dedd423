mod common;

use common::*;
use mockito::{Matcher, Server};
use serde_json::json;
use serial_test::serial;
use tfplug::types::DynamicValue;

fn nat_json(state: &str) -> serde_json::Value {
    json!({
        "NatGatewayId": "nat-1",
        "NatGatewayName": "demo",
        "VpcId": "vpc-1",
        "State": state,
        "MaxConcurrentConnection": 1000000,
        "InternetMaxBandwidthOut": 100,
        "CreatedTime": "2024-01-01 00:00:00",
        "PublicIpAddressSet": [{"AddressId": "eip-1", "PublicIpAddress": "1.1.1.1"}],
        "Zone": "ap-guangzhou-3"
    })
}

fn nat_planned() -> DynamicValue {
    let mut planned = DynamicValue::empty_object();
    planned.set_string(&path("name"), "demo").unwrap();
    planned.set_string(&path("vpc_id"), "vpc-1").unwrap();
    planned
        .set_string_list(&path("assigned_eip_set"), ["1.1.1.1"])
        .unwrap();
    planned
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn nat_gateway_create_waits_until_available() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/")
        .match_header("x-tc-action", "CreateNatGateway")
        .match_body(Matcher::PartialJson(json!({
            "NatGatewayName": "demo",
            "VpcId": "vpc-1",
            "InternetMaxBandwidthOut": 100,
            "MaxConcurrentConnection": 1000000,
            "PublicIpAddresses": ["1.1.1.1"]
        })))
        .with_body(
            json!({"Response": {"NatGatewaySet": [nat_json("PENDING")], "RequestId": "req-1"}})
                .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let pending = mock_times(
        &mut server,
        "DescribeNatGateways",
        2,
        json!({"NatGatewaySet": [nat_json("PENDING")], "RequestId": "req-2"}),
    )
    .await;
    let _available = mock_action(
        &mut server,
        "DescribeNatGateways",
        json!({"NatGatewaySet": [nat_json("AVAILABLE")], "RequestId": "req-3"}),
    )
    .await;
    let _address = mock_action(
        &mut server,
        "DescribeAddresses",
        json!({"AddressSet": [{"AddressId": "eip-1", "AddressIp": "1.1.1.1", "Bandwidth": 50}], "RequestId": "req-4"}),
    )
    .await;
    let _tags = mock_action(
        &mut server,
        "DescribeResourceTagsByResourceIds",
        json!({"Tags": [], "TotalCount": 0, "RequestId": "req-5"}),
    )
    .await;

    let provider_data = provider_data(&server);
    let nat = resource(&provider_data, "tencentcloud_nat_gateway").await;
    let response = common::create(nat.as_ref(), "tencentcloud_nat_gateway", nat_planned()).await;

    assert!(response.diagnostics.is_empty(), "{:?}", details(&response.diagnostics));
    let state = response.new_state;
    assert_eq!(state.get_string_opt(&path("id")).as_deref(), Some("nat-1"));
    assert_eq!(
        state.get_i64_opt(&path("stock_public_ip_addresses_bandwidth_out")),
        Some(50)
    );
    assert_eq!(state.get_i64_opt(&path("bandwidth")), Some(100));
    create.assert_async().await;
    pending.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn nat_gateway_create_stops_on_failed_state() {
    let mut server = Server::new_async().await;
    let _create = mock_action(
        &mut server,
        "CreateNatGateway",
        json!({"NatGatewaySet": [nat_json("PENDING")], "RequestId": "req-1"}),
    )
    .await;
    let describe = mock_times(
        &mut server,
        "DescribeNatGateways",
        1,
        json!({"NatGatewaySet": [nat_json("FAILED")], "RequestId": "req-2"}),
    )
    .await;

    let provider_data = provider_data(&server);
    let nat = resource(&provider_data, "tencentcloud_nat_gateway").await;
    let response = create(nat.as_ref(), "tencentcloud_nat_gateway", nat_planned()).await;

    assert_eq!(response.diagnostics.len(), 1);
    assert!(response.diagnostics[0].detail.contains("failed to create"));
    // the id is kept so the gateway can still be destroyed
    assert_eq!(
        response.new_state.get_string_opt(&path("id")).as_deref(),
        Some("nat-1")
    );
    describe.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn nat_gateway_delete_waits_until_gone() {
    let mut server = Server::new_async().await;
    let delete_call = server
        .mock("POST", "/")
        .match_header("x-tc-action", "DeleteNatGateway")
        .match_body(Matcher::Json(json!({"NatGatewayId": "nat-1"})))
        .with_body(json!({"Response": {"RequestId": "req-1"}}).to_string())
        .expect(1)
        .create_async()
        .await;
    let deleting = mock_times(
        &mut server,
        "DescribeNatGateways",
        2,
        json!({"NatGatewaySet": [nat_json("DELETING")], "RequestId": "req-2"}),
    )
    .await;
    let gone = mock_times(
        &mut server,
        "DescribeNatGateways",
        1,
        json!({"NatGatewaySet": [], "RequestId": "req-3"}),
    )
    .await;

    let provider_data = provider_data(&server);
    let nat = resource(&provider_data, "tencentcloud_nat_gateway").await;
    let response = delete(nat.as_ref(), "tencentcloud_nat_gateway", with_id("nat-1")).await;

    assert!(response.diagnostics.is_empty(), "{:?}", details(&response.diagnostics));
    delete_call.assert_async().await;
    deleting.assert_async().await;
    gone.assert_async().await;
}

fn ha_vip_json(address_ip: &str) -> serde_json::Value {
    json!({
        "HaVipId": "havip-1",
        "HaVipName": "demo",
        "Vip": "10.0.0.10",
        "VpcId": "vpc-1",
        "SubnetId": "subnet-1",
        "AddressIp": address_ip,
        "State": "AVAILABLE"
    })
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn ha_vip_eip_attach_waits_for_address() {
    let mut server = Server::new_async().await;
    let associate = server
        .mock("POST", "/")
        .match_header("x-tc-action", "AssociateAddressWithHaVip")
        .match_body(Matcher::Json(json!({"HaVipId": "havip-1", "AddressIp": "1.1.1.1"})))
        .with_body(json!({"Response": {"RequestId": "req-1"}}).to_string())
        .expect(1)
        .create_async()
        .await;
    let unbound = mock_times(
        &mut server,
        "DescribeHaVips",
        2,
        json!({"HaVipSet": [ha_vip_json("")], "RequestId": "req-2"}),
    )
    .await;
    let _bound = mock_action(
        &mut server,
        "DescribeHaVips",
        json!({"HaVipSet": [ha_vip_json("1.1.1.1")], "RequestId": "req-3"}),
    )
    .await;

    let provider_data = provider_data(&server);
    let attachment = resource(&provider_data, "tencentcloud_ha_vip_eip_attachment").await;

    let mut planned = DynamicValue::empty_object();
    planned.set_string(&path("havip_id"), "havip-1").unwrap();
    planned.set_string(&path("address_ip"), "1.1.1.1").unwrap();
    let response = create(
        attachment.as_ref(),
        "tencentcloud_ha_vip_eip_attachment",
        planned,
    )
    .await;

    assert!(response.diagnostics.is_empty(), "{:?}", details(&response.diagnostics));
    assert_eq!(
        response.new_state.get_string_opt(&path("id")).as_deref(),
        Some("havip-1#1.1.1.1")
    );
    associate.assert_async().await;
    unbound.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn ha_vip_eip_detach_waits_for_empty_address() {
    let mut server = Server::new_async().await;
    let disassociate = server
        .mock("POST", "/")
        .match_header("x-tc-action", "DisassociateAddressFromHaVip")
        .match_body(Matcher::Json(json!({"HaVipId": "havip-1"})))
        .with_body(json!({"Response": {"RequestId": "req-1"}}).to_string())
        .expect(1)
        .create_async()
        .await;
    let still_bound = mock_times(
        &mut server,
        "DescribeHaVips",
        1,
        json!({"HaVipSet": [ha_vip_json("1.1.1.1")], "RequestId": "req-2"}),
    )
    .await;
    let released = mock_times(
        &mut server,
        "DescribeHaVips",
        1,
        json!({"HaVipSet": [ha_vip_json("")], "RequestId": "req-3"}),
    )
    .await;

    let provider_data = provider_data(&server);
    let attachment = resource(&provider_data, "tencentcloud_ha_vip_eip_attachment").await;
    let response = delete(
        attachment.as_ref(),
        "tencentcloud_ha_vip_eip_attachment",
        with_id("havip-1#1.1.1.1"),
    )
    .await;

    assert!(response.diagnostics.is_empty(), "{:?}", details(&response.diagnostics));
    disassociate.assert_async().await;
    still_bound.assert_async().await;
    released.assert_async().await;
}

fn bandwidth_package_json(status: &str) -> serde_json::Value {
    json!({
        "BandwidthPackageId": "bwp-1",
        "BandwidthPackageName": "demo",
        "NetworkType": "BGP",
        "ChargeType": "TOP5_POSTPAID_BY_MONTH",
        "Status": status,
        "Bandwidth": 100,
        "Egress": "center_egress1",
        "ResourceSet": []
    })
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn bandwidth_package_create_waits_until_created() {
    let mut server = Server::new_async().await;
    let create_call = server
        .mock("POST", "/")
        .match_header("x-tc-action", "CreateBandwidthPackage")
        .match_body(Matcher::PartialJson(json!({
            "NetworkType": "BGP",
            "BandwidthPackageName": "demo",
            "Tags": [{"Key": "env", "Value": "test"}]
        })))
        .with_body(json!({"Response": {"BandwidthPackageId": "bwp-1", "RequestId": "req-1"}}).to_string())
        .expect(1)
        .create_async()
        .await;
    let creating = mock_times(
        &mut server,
        "DescribeBandwidthPackages",
        2,
        json!({"BandwidthPackageSet": [bandwidth_package_json("CREATING")], "RequestId": "req-2"}),
    )
    .await;
    let _created = mock_action(
        &mut server,
        "DescribeBandwidthPackages",
        json!({"BandwidthPackageSet": [bandwidth_package_json("CREATED")], "RequestId": "req-3"}),
    )
    .await;
    let _tags = mock_action(
        &mut server,
        "DescribeResourceTagsByResourceIds",
        json!({"Tags": [{"TagKey": "env", "TagValue": "test"}], "TotalCount": 1, "RequestId": "req-4"}),
    )
    .await;

    let provider_data = provider_data(&server);
    let package = resource(&provider_data, "tencentcloud_vpc_bandwidth_package").await;

    let mut planned = DynamicValue::empty_object();
    planned.set_string(&path("network_type"), "BGP").unwrap();
    planned
        .set_string(&path("bandwidth_package_name"), "demo")
        .unwrap();
    planned
        .set_string_map(&path("tags"), [("env", "test")])
        .unwrap();
    let response = create(
        package.as_ref(),
        "tencentcloud_vpc_bandwidth_package",
        planned,
    )
    .await;

    assert!(response.diagnostics.is_empty(), "{:?}", details(&response.diagnostics));
    let state = response.new_state;
    assert_eq!(state.get_string_opt(&path("id")).as_deref(), Some("bwp-1"));
    assert_eq!(state.get_i64_opt(&path("internet_max_bandwidth")), Some(100));
    assert_eq!(
        state.get_string_map(&path("tags")).get("env").map(String::as_str),
        Some("test")
    );
    create_call.assert_async().await;
    creating.assert_async().await;
}

fn eni_ips(count: usize) -> Vec<serde_json::Value> {
    (0..count)
        .map(|i| {
            json!({
                "PrivateIpAddress": format!("10.0.0.{}", i + 10),
                "Primary": i == 0,
                "Description": ""
            })
        })
        .collect()
}

fn eni_json(state: &str, ip_count: usize) -> serde_json::Value {
    json!({
        "NetworkInterfaceId": "eni-1",
        "NetworkInterfaceName": "demo",
        "NetworkInterfaceDescription": "",
        "VpcId": "vpc-1",
        "SubnetId": "subnet-1",
        "GroupSet": ["sg-1"],
        "Primary": false,
        "MacAddress": "20:90:6F:00:00:01",
        "State": state,
        "PrivateIpAddressSet": eni_ips(ip_count),
        "CreatedTime": "2024-01-01 00:00:00",
        "CdcId": "cluster-1",
        "TagSet": []
    })
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn eni_create_assigns_ips_in_chunks_of_ten() {
    let mut server = Server::new_async().await;
    let create_call = server
        .mock("POST", "/")
        .match_header("x-tc-action", "CreateNetworkInterface")
        .match_body(Matcher::PartialJson(json!({
            "NetworkInterfaceName": "demo",
            "SecondaryPrivateIpAddressCount": 9,
            "SecurityGroupIds": ["sg-1"]
        })))
        .with_body(
            json!({"Response": {"NetworkInterface": eni_json("PENDING", 10), "RequestId": "req-1"}})
                .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let assign_ten = server
        .mock("POST", "/")
        .match_header("x-tc-action", "AssignPrivateIpAddresses")
        .match_body(Matcher::PartialJson(json!({
            "NetworkInterfaceId": "eni-1",
            "SecondaryPrivateIpAddressCount": 10
        })))
        .with_body(json!({"Response": {"RequestId": "assign-1"}}).to_string())
        .expect(1)
        .create_async()
        .await;
    let assign_five = server
        .mock("POST", "/")
        .match_header("x-tc-action", "AssignPrivateIpAddresses")
        .match_body(Matcher::PartialJson(json!({
            "NetworkInterfaceId": "eni-1",
            "SecondaryPrivateIpAddressCount": 5
        })))
        .with_body(json!({"Response": {"RequestId": "assign-2"}}).to_string())
        .expect(1)
        .create_async()
        .await;
    let mut tasks = Vec::new();
    for task_id in ["assign-1", "assign-2"] {
        tasks.push(
            server
                .mock("POST", "/")
                .match_header("x-tc-action", "DescribeVpcTaskResult")
                .match_body(Matcher::Json(json!({"TaskId": task_id})))
                .with_body(json!({"Response": task_success()}).to_string())
                .expect(1)
                .create_async()
                .await,
        );
    }
    let partial = mock_times(
        &mut server,
        "DescribeNetworkInterfaces",
        1,
        json!({"NetworkInterfaceSet": [eni_json("AVAILABLE", 20)], "RequestId": "req-2"}),
    )
    .await;
    let _ready = mock_action(
        &mut server,
        "DescribeNetworkInterfaces",
        json!({"NetworkInterfaceSet": [eni_json("AVAILABLE", 25)], "RequestId": "req-3"}),
    )
    .await;

    let provider_data = provider_data(&server);
    let eni = resource(&provider_data, "tencentcloud_eni").await;

    let mut planned = DynamicValue::empty_object();
    planned.set_string(&path("name"), "demo").unwrap();
    planned.set_string(&path("vpc_id"), "vpc-1").unwrap();
    planned.set_string(&path("subnet_id"), "subnet-1").unwrap();
    planned
        .set_string_list(&path("security_groups"), ["sg-1"])
        .unwrap();
    planned.set_i64(&path("ipv4_count"), 25).unwrap();
    let response = create(eni.as_ref(), "tencentcloud_eni", planned).await;

    assert!(response.diagnostics.is_empty(), "{:?}", details(&response.diagnostics));
    let state = response.new_state;
    assert_eq!(state.get_string_opt(&path("id")).as_deref(), Some("eni-1"));
    assert_eq!(state.get_i64_opt(&path("ipv4_count")), Some(25));
    assert_eq!(state.get_object_list(&path("ipv4_info")).len(), 25);
    assert_eq!(state.get_string_opt(&path("cdc_id")).as_deref(), Some("cluster-1"));

    create_call.assert_async().await;
    assign_ten.assert_async().await;
    assign_five.assert_async().await;
    for task in tasks {
        task.assert_async().await;
    }
    partial.assert_async().await;
}

fn route_table_json(routes: serde_json::Value) -> serde_json::Value {
    json!({
        "RouteTableSet": [{
            "RouteTableId": "rtb-1",
            "VpcId": "vpc-1",
            "RouteTableName": "demo",
            "Main": false,
            "RouteSet": routes
        }],
        "TotalCount": 1,
        "RequestId": "req-2"
    })
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn route_entry_create_looks_again_until_visible() {
    let mut server = Server::new_async().await;
    let create_call = server
        .mock("POST", "/")
        .match_header("x-tc-action", "CreateRoutes")
        .match_body(Matcher::Json(json!({
            "RouteTableId": "rtb-1",
            "Routes": [{
                "DestinationCidrBlock": "10.4.0.0/16",
                "GatewayType": "NAT",
                "GatewayId": "nat-1",
                "RouteDescription": "to nat"
            }]
        })))
        .with_body(json!({"Response": {"RequestId": "req-1"}}).to_string())
        .expect(1)
        .create_async()
        .await;
    let not_yet = mock_times(&mut server, "DescribeRouteTables", 1, route_table_json(json!([]))).await;
    let _visible = mock_action(
        &mut server,
        "DescribeRouteTables",
        route_table_json(json!([{
            "RouteId": 11,
            "DestinationCidrBlock": "10.4.0.0/16",
            "GatewayType": "NAT",
            "GatewayId": "nat-1",
            "RouteDescription": "to nat",
            "RouteItemId": "rti-1",
            "Enabled": true
        }])),
    )
    .await;

    let provider_data = provider_data(&server);
    let entry = resource(&provider_data, "tencentcloud_route_table_entry").await;

    let mut planned = DynamicValue::empty_object();
    planned.set_string(&path("route_table_id"), "rtb-1").unwrap();
    planned
        .set_string(&path("destination_cidr_block"), "10.4.0.0/16")
        .unwrap();
    planned.set_string(&path("next_type"), "NAT").unwrap();
    planned.set_string(&path("next_hub"), "nat-1").unwrap();
    planned.set_string(&path("description"), "to nat").unwrap();
    let response = create(entry.as_ref(), "tencentcloud_route_table_entry", planned).await;

    assert!(response.diagnostics.is_empty(), "{:?}", details(&response.diagnostics));
    let state = response.new_state;
    assert_eq!(state.get_string_opt(&path("id")).as_deref(), Some("11.rtb-1"));
    assert_eq!(state.get_string_opt(&path("route_item_id")).as_deref(), Some("rti-1"));
    assert_eq!(state.get_bool_opt(&path("disabled")), Some(false));
    create_call.assert_async().await;
    not_yet.assert_async().await;
}
