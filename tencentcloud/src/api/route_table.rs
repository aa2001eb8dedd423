//! Route table and route entry calls

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::MUTEX_TASK_RUNNING;
use super::{collect_pages, Ack, ApiError, Client, Filter, Tag};

/// Waits between lookups of a freshly created route entry
const ROUTE_LOOKUP_DELAYS: [Duration; 2] = [Duration::from_secs(3), Duration::from_secs(5)];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Route {
    #[serde(skip_serializing_if = "is_zero")]
    pub route_id: u64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub destination_cidr_block: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub gateway_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub gateway_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub route_description: String,
    #[serde(skip_serializing)]
    pub route_type: String,
    #[serde(skip_serializing)]
    pub route_item_id: String,
    #[serde(skip_serializing)]
    pub enabled: bool,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RouteTableAssociation {
    pub subnet_id: String,
    pub route_table_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RouteTableInfo {
    pub route_table_id: String,
    pub route_table_name: String,
    pub vpc_id: String,
    /// Whether this is the VPC's default route table
    pub main: bool,
    pub created_time: String,
    pub association_set: Vec<RouteTableAssociation>,
    pub route_set: Vec<Route>,
    pub tag_set: Vec<Tag>,
}

impl RouteTableInfo {
    pub fn subnet_ids(&self) -> Vec<String> {
        self.association_set
            .iter()
            .map(|a| a.subnet_id.clone())
            .collect()
    }

    /// Route entry ids as `"<route_id>.<route_table_id>"`
    pub fn route_entry_ids(&self) -> Vec<String> {
        self.route_set
            .iter()
            .map(|r| format!("{}.{}", r.route_id, self.route_table_id))
            .collect()
    }

    pub fn find_route(&self, destination: &str, next_type: &str, next_hub: &str) -> Option<&Route> {
        self.route_set.iter().find(|r| {
            r.destination_cidr_block == destination
                && r.gateway_type == next_type
                && r.gateway_id == next_hub
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateRouteTableRequest<'a> {
    vpc_id: &'a str,
    route_table_name: &'a str,
    #[serde(skip_serializing_if = "<[Tag]>::is_empty")]
    tags: &'a [Tag],
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateRouteTableResponse {
    route_table: RouteTableInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeRouteTablesRequest<'a> {
    #[serde(skip_serializing_if = "<[Filter]>::is_empty")]
    filters: &'a [Filter],
    offset: String,
    limit: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeRouteTablesResponse {
    #[serde(default)]
    route_table_set: Vec<RouteTableInfo>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ModifyRouteTableAttributeRequest<'a> {
    route_table_id: &'a str,
    route_table_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RouteTableIdRequest<'a> {
    route_table_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RoutesRequest<'a> {
    route_table_id: &'a str,
    routes: Vec<Route>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RouteIdsRequest<'a> {
    route_table_id: &'a str,
    route_ids: &'a [u64],
}

pub struct RouteTableApi<'a> {
    client: &'a Client,
}

impl<'a> RouteTableApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create(
        &self,
        vpc_id: &str,
        name: &str,
        tags: &[Tag],
    ) -> Result<RouteTableInfo, ApiError> {
        let response: CreateRouteTableResponse = self
            .client
            .write(
                "CreateRouteTable",
                &CreateRouteTableRequest {
                    vpc_id,
                    route_table_name: name,
                    tags,
                },
                &[],
            )
            .await?;
        Ok(response.route_table)
    }

    pub async fn describe(&self, filters: &[Filter]) -> Result<Vec<RouteTableInfo>, ApiError> {
        collect_pages(
            "DescribeRouteTables",
            move |offset, limit| async move {
                let response: DescribeRouteTablesResponse = self
                    .client
                    .read(
                        "DescribeRouteTables",
                        &DescribeRouteTablesRequest {
                            filters,
                            offset: offset.to_string(),
                            limit: limit.to_string(),
                        },
                    )
                    .await?;
                Ok(response.route_table_set)
            },
            |table| table.route_table_id.clone(),
        )
        .await
    }

    pub async fn describe_by_id(
        &self,
        route_table_id: &str,
    ) -> Result<Option<RouteTableInfo>, ApiError> {
        match self
            .describe(&[Filter::new("route-table-id", route_table_id)])
            .await
        {
            Ok(tables) => Ok(tables
                .into_iter()
                .find(|t| t.route_table_id == route_table_id)),
            Err(e) if super::is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The VPC's main route table
    pub async fn describe_default(&self, vpc_id: &str) -> Result<Option<RouteTableInfo>, ApiError> {
        let tables = self
            .describe(&[
                Filter::new("vpc-id", vpc_id),
                Filter::new("association.main", "true"),
            ])
            .await?;
        Ok(tables.into_iter().find(|t| t.main))
    }

    pub async fn modify_name(&self, route_table_id: &str, name: &str) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "ModifyRouteTableAttribute",
                &ModifyRouteTableAttributeRequest {
                    route_table_id,
                    route_table_name: name,
                },
                &[],
            )
            .await?;
        Ok(())
    }

    pub async fn delete(&self, route_table_id: &str) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "DeleteRouteTable",
                &RouteTableIdRequest { route_table_id },
                &[MUTEX_TASK_RUNNING],
            )
            .await?;
        Ok(())
    }

    /// Creates one route and returns its id. The new entry may take a few
    /// seconds to show up in DescribeRouteTables.
    pub async fn create_route(&self, route_table_id: &str, route: Route) -> Result<u64, ApiError> {
        let destination = route.destination_cidr_block.clone();
        let next_type = route.gateway_type.clone();
        let next_hub = route.gateway_id.clone();

        let _: Ack = self
            .client
            .write(
                "CreateRoutes",
                &RoutesRequest {
                    route_table_id,
                    routes: vec![route],
                },
                &[MUTEX_TASK_RUNNING],
            )
            .await?;

        let mut delays = ROUTE_LOOKUP_DELAYS.iter();
        loop {
            let table = self.describe_by_id(route_table_id).await?.ok_or_else(|| {
                ApiError::InconsistentState(format!(
                    "route table [{}] of this route entry not found",
                    route_table_id
                ))
            })?;
            if let Some(found) = table.find_route(&destination, &next_type, &next_hub) {
                return Ok(found.route_id);
            }
            match delays.next() {
                Some(delay) => {
                    tracing::warn!(
                        route_table_id,
                        destination = %destination,
                        "route entry not visible yet, looking again"
                    );
                    tokio::time::sleep(*delay).await;
                }
                None => {
                    return Err(ApiError::InconsistentState(format!(
                        "route entry id not found in route table [{}]",
                        route_table_id
                    )))
                }
            }
        }
    }

    pub async fn delete_route(&self, route_table_id: &str, route_id: u64) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "DeleteRoutes",
                &RoutesRequest {
                    route_table_id,
                    routes: vec![Route {
                        route_id,
                        ..Default::default()
                    }],
                },
                &[MUTEX_TASK_RUNNING],
            )
            .await?;
        Ok(())
    }

    pub async fn set_routes_enabled(
        &self,
        route_table_id: &str,
        route_ids: &[u64],
        enabled: bool,
    ) -> Result<(), ApiError> {
        let action = if enabled { "EnableRoutes" } else { "DisableRoutes" };
        let _: Ack = self
            .client
            .write(
                action,
                &RouteIdsRequest {
                    route_table_id,
                    route_ids,
                },
                &[MUTEX_TASK_RUNNING],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::ClientConfig;
    use mockito::{Matcher, Server};

    fn client(url: &str) -> Client {
        let mut config = ClientConfig::new("id", "key", "ap-guangzhou");
        config.endpoint = Some(url.to_string());
        config.write_timeout = Duration::from_secs(3);
        Client::new(config).unwrap()
    }

    const MUTEX_BODY: &str = r#"{"Response":{"Error":{"Code":"UnsupportedOperation.MutexOperationTaskRunning","Message":"task running"},"RequestId":"r1"}}"#;

    #[test]
    fn route_serializes_only_set_fields() {
        let route = Route {
            destination_cidr_block: "10.0.0.0/16".to_string(),
            gateway_type: "NAT".to_string(),
            gateway_id: "nat-1".to_string(),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&route).unwrap(),
            serde_json::json!({
                "DestinationCidrBlock": "10.0.0.0/16",
                "GatewayType": "NAT",
                "GatewayId": "nat-1"
            })
        );

        let by_id = Route {
            route_id: 7,
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&by_id).unwrap(),
            serde_json::json!({"RouteId": 7})
        );
    }

    #[test]
    fn route_table_derived_fields() {
        let table: RouteTableInfo = serde_json::from_value(serde_json::json!({
            "RouteTableId": "rtb-1",
            "Main": true,
            "AssociationSet": [{"SubnetId": "subnet-1", "RouteTableId": "rtb-1"}],
            "RouteSet": [
                {"RouteId": 11, "DestinationCidrBlock": "0.0.0.0/0", "GatewayType": "NAT", "GatewayId": "nat-1", "Enabled": true}
            ]
        }))
        .unwrap();

        assert_eq!(table.subnet_ids(), vec!["subnet-1"]);
        assert_eq!(table.route_entry_ids(), vec!["11.rtb-1"]);
        assert_eq!(
            table.find_route("0.0.0.0/0", "NAT", "nat-1").map(|r| r.route_id),
            Some(11)
        );
        assert!(table.find_route("0.0.0.0/0", "NAT", "nat-2").is_none());
    }

    #[tokio::test]
    async fn delete_route_waits_out_running_task() {
        let mut server = Server::new_async().await;
        let busy = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DeleteRoutes")
            .with_body(MUTEX_BODY)
            .expect(1)
            .create_async()
            .await;
        let done = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DeleteRoutes")
            .match_body(Matcher::Json(serde_json::json!({
                "RouteTableId": "rtb-1",
                "Routes": [{"RouteId": 7}]
            })))
            .with_body(r#"{"Response":{"RequestId":"r2"}}"#)
            .expect(1)
            .create_async()
            .await;

        client(&server.url())
            .route_tables()
            .delete_route("rtb-1", 7)
            .await
            .unwrap();

        busy.assert_async().await;
        done.assert_async().await;
    }

    #[tokio::test]
    async fn route_toggles_and_table_delete_retry_running_task() {
        let mut server = Server::new_async().await;
        let mut mocks = Vec::new();
        for action in ["DisableRoutes", "DeleteRouteTable"] {
            mocks.push(
                server
                    .mock("POST", "/")
                    .match_header("x-tc-action", action)
                    .with_body(MUTEX_BODY)
                    .expect(1)
                    .create_async()
                    .await,
            );
            mocks.push(
                server
                    .mock("POST", "/")
                    .match_header("x-tc-action", action)
                    .with_body(r#"{"Response":{"RequestId":"r2"}}"#)
                    .expect(1)
                    .create_async()
                    .await,
            );
        }

        let client = client(&server.url());
        client
            .route_tables()
            .set_routes_enabled("rtb-1", &[7, 8], false)
            .await
            .unwrap();
        client.route_tables().delete("rtb-1").await.unwrap();

        for mock in mocks {
            mock.assert_async().await;
        }
    }
}
