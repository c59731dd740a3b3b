//! Listing installed namespace policies from the committer's query service.

use std::io::Write;

use fxconfig_proto::protoblocktx::PolicyItem;
use fxconfig_proto::protoqueryservice::query_service_client::QueryServiceClient;

use crate::config::QueryConfig;
use crate::connection::Connection;
use crate::error::{Result, TimeoutSnafu};

/// Fetches every installed namespace policy.
///
/// Opens one connection, issues a single `GetNamespacePolicies` call and closes
/// the connection. The configured timeout bounds the whole call.
///
/// # Errors
///
/// Returns [`Error::Timeout`](crate::Error::Timeout) if the deadline passes, or
/// a transport or RPC error if the query service cannot be reached.
pub async fn list_namespaces(config: &QueryConfig) -> Result<Vec<PolicyItem>> {
    let timeout = config.timeout();

    let query = async {
        let connection = Connection::open(config).await?;
        let mut client = QueryServiceClient::new(connection.channel());
        let response = client.get_namespace_policies(()).await?;
        Ok::<_, crate::Error>(response.into_inner().policies)
    };

    match tokio::time::timeout(timeout, query).await {
        Ok(result) => {
            let policies = result?;
            tracing::debug!(
                endpoint = config.endpoint(),
                count = policies.len(),
                "Fetched namespace policies"
            );
            Ok(policies)
        },
        Err(_) => {
            TimeoutSnafu { duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX) }
                .fail()
        },
    }
}

/// Writes a numbered listing of namespace policies.
///
/// ```text
/// Installed namespaces (2 total):
/// 0) ns1: version 0 policy: 0a054543445341
/// 1) ns2: version 3 policy: 0a054543445341
///
/// ```
///
/// # Errors
///
/// Returns any error from the writer.
pub fn print_policies(out: &mut impl Write, policies: &[PolicyItem]) -> std::io::Result<()> {
    writeln!(out, "Installed namespaces ({} total):", policies.len())?;
    for (index, item) in policies.iter().enumerate() {
        writeln!(
            out,
            "{index}) {}: version {} policy: {}",
            item.namespace,
            item.version,
            hex::encode(&item.policy)
        )?;
    }
    writeln!(out)
}
