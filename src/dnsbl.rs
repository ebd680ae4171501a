//! Optional external DNSBL lookups: a reverse-octet A-record query under
//! `<reversed-ip>.<provider>`, per spec §4.E step 6.

use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

use crate::error::Result;

/// Builds the reverse-octet query name, e.g. `1.2.3.4` under `dronebl.org`
/// becomes `4.3.2.1.dronebl.org`.
pub fn reverse_query_name(ip: &str, provider: &str) -> Option<String> {
    let octets: Vec<&str> = ip.split('.').collect();
    if octets.len() != 4 {
        return None;
    }
    Some(format!(
        "{}.{}.{}.{}.{provider}",
        octets[3], octets[2], octets[1], octets[0]
    ))
}

/// Queries the provider's reverse zone for an A record. A resolved A record
/// means the IP is listed; `NXDOMAIN` (or any resolution failure) means it
/// is not. Returns `Ok(false)` rather than propagating DNS errors — a DNSBL
/// miss and a DNSBL timeout are both "no tag to merge" to the caller.
pub async fn lookup(ip: &str, provider: &str) -> Result<bool> {
    let Some(query_name) = reverse_query_name(ip, provider) else {
        return Ok(false);
    };
    let Ok(resolver) = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()) else {
        return Ok(false);
    };
    match resolver.lookup_ip(query_name).await {
        Ok(response) => Ok(response.iter().next().is_some()),
        Err(_) => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverses_octets_under_the_provider_zone() {
        assert_eq!(
            reverse_query_name("1.2.3.4", "dronebl.org"),
            Some("4.3.2.1.dronebl.org".to_string())
        );
    }

    #[test]
    fn rejects_malformed_ip() {
        assert_eq!(reverse_query_name("not.an.ip.at.all", "dronebl.org"), None);
    }
}
