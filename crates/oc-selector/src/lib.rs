//! C5: the seller selector. Resolves an order's buyer location and
//! candidate sellers via the persistence facade, ranks them by distance
//! from an external oracle, and falls back to a fixed distance on oracle
//! failure (spec §4.5, scenario S6).

use async_trait::async_trait;
use oc_schemas::SellerEntry;
use std::time::Duration;

/// Order/seller lookups the selector needs from the persistence facade.
/// Implemented against the real HTTP facade in `oc-persistence`'s consumer
/// (the processor binary) and with an in-memory fixture in `oc-testkit`.
#[async_trait]
pub trait OrderDirectory: Send + Sync {
    async fn buyer_location(&self, order_id: &str) -> anyhow::Result<(f64, f64)>;
    async fn order_industry(&self, order_id: &str) -> anyhow::Result<String>;
    async fn sellers_in_industry(&self, industry: &str) -> anyhow::Result<Vec<String>>;
}

/// The external distance oracle (spec §4.5 step 3). Failure is not
/// propagated by the selector — it substitutes [`FALLBACK_DISTANCE_KM`].
#[async_trait]
pub trait DistanceOracle: Send + Sync {
    async fn distance_km(&self, from: (f64, f64), seller_id: &str) -> anyhow::Result<f64>;
}

/// `reqwest`-backed [`DistanceOracle`] with bounded retry (supplemented
/// feature, grounded in `sync_utils.py::execute_with_retry`) before the
/// caller's fallback applies.
pub struct HttpDistanceOracle {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl HttpDistanceOracle {
    pub fn new(client: reqwest::Client, base_url: String, api_key: Option<String>, max_retries: u32) -> Self {
        HttpDistanceOracle {
            client,
            base_url,
            api_key,
            max_retries,
        }
    }
}

#[async_trait]
impl DistanceOracle for HttpDistanceOracle {
    async fn distance_km(&self, from: (f64, f64), seller_id: &str) -> anyhow::Result<f64> {
        let mut attempt = 0;
        loop {
            let mut req = self
                .client
                .get(format!("{}/distance", self.base_url))
                .query(&[
                    ("origin_lat", from.0.to_string()),
                    ("origin_lng", from.1.to_string()),
                    ("seller_id", seller_id.to_string()),
                ]);
            if let Some(key) = &self.api_key {
                req = req.bearer_auth(key);
            }
            match req.send().await.and_then(|r| r.error_for_status()) {
                Ok(resp) => {
                    let body: serde_json::Value = resp.json().await?;
                    let km = body
                        .get("distance_km")
                        .and_then(|v| v.as_f64())
                        .ok_or_else(|| anyhow::anyhow!("distance oracle response missing distance_km"))?;
                    return Ok(km);
                }
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        return Err(e.into());
                    }
                    tracing::warn!(attempt, seller_id, error = %e, "distance oracle call failed, retrying");
                    tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
                }
            }
        }
    }
}

/// `reqwest`-backed [`OrderDirectory`] against the persistence facade's
/// order/seller CRUD surface (spec §1 out-of-scope side, §4.5 steps 1-2).
/// Bearer-authenticated the same way `HttpPersistenceFacade` is, since both
/// sit in front of the same facade.
pub struct HttpOrderDirectory {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpOrderDirectory {
    pub fn new(client: reqwest::Client, base_url: String, bearer_token: Option<String>) -> Self {
        HttpOrderDirectory { client, base_url, bearer_token }
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.get(format!("{}{}", self.base_url, path));
        if let Some(token) = &self.bearer_token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn order(&self, order_id: &str) -> anyhow::Result<serde_json::Value> {
        Ok(self
            .request(&format!("/orders/{order_id}"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }
}

#[async_trait]
impl OrderDirectory for HttpOrderDirectory {
    async fn buyer_location(&self, order_id: &str) -> anyhow::Result<(f64, f64)> {
        let body = self.order(order_id).await?;
        let lat = body
            .get("lat")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| anyhow::anyhow!("order {order_id} response missing lat"))?;
        let lng = body
            .get("lng")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| anyhow::anyhow!("order {order_id} response missing lng"))?;
        Ok((lat, lng))
    }

    async fn order_industry(&self, order_id: &str) -> anyhow::Result<String> {
        let body = self.order(order_id).await?;
        body.get("industry")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("order {order_id} response missing industry"))
    }

    async fn sellers_in_industry(&self, industry: &str) -> anyhow::Result<Vec<String>> {
        let body: serde_json::Value = self
            .request(&format!("/industries/{industry}/sellers"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let sellers = body
            .get("sellers")
            .and_then(|v| v.as_array())
            .ok_or_else(|| anyhow::anyhow!("industry {industry} response missing sellers"))?;
        sellers
            .iter()
            .map(|v| v.as_str().map(str::to_string).ok_or_else(|| anyhow::anyhow!("seller id not a string")))
            .collect()
    }
}

/// Runs the full C5 pipeline and returns the ranked, truncated seller list
/// (spec §4.5 steps 1-4; step 5, writing into `OrderState.sellers`, is the
/// caller's responsibility since that struct lives in `oc-state`).
pub async fn select_sellers(
    directory: &dyn OrderDirectory,
    oracle: &dyn DistanceOracle,
    order_id: &str,
    max_sellers: usize,
    fallback_distance_km: f64,
) -> anyhow::Result<Vec<SellerEntry>> {
    let buyer_location = directory.buyer_location(order_id).await?;
    let industry = directory.order_industry(order_id).await?;
    let candidates = directory.sellers_in_industry(&industry).await?;

    let mut entries = Vec::with_capacity(candidates.len());
    for seller_id in candidates {
        let distance_km = match oracle.distance_km(buyer_location, &seller_id).await {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(seller_id, error = %e, "distance oracle unavailable, using fallback distance");
                fallback_distance_km
            }
        };
        entries.push(SellerEntry { seller_id, distance_km });
    }

    // Stable sort: equal distances preserve enumeration order (spec §4.5
    // tie-break).
    entries.sort_by(|a, b| a.distance_km.partial_cmp(&b.distance_km).unwrap_or(std::cmp::Ordering::Equal));
    entries.truncate(max_sellers);
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FixedDirectory {
        sellers: Vec<String>,
    }

    #[async_trait]
    impl OrderDirectory for FixedDirectory {
        async fn buyer_location(&self, _order_id: &str) -> anyhow::Result<(f64, f64)> {
            Ok((1.0, 2.0))
        }
        async fn order_industry(&self, _order_id: &str) -> anyhow::Result<String> {
            Ok("widgets".to_string())
        }
        async fn sellers_in_industry(&self, _industry: &str) -> anyhow::Result<Vec<String>> {
            Ok(self.sellers.clone())
        }
    }

    struct AlwaysFailsOracle;
    #[async_trait]
    impl DistanceOracle for AlwaysFailsOracle {
        async fn distance_km(&self, _from: (f64, f64), _seller_id: &str) -> anyhow::Result<f64> {
            anyhow::bail!("oracle down")
        }
    }

    struct CountingOkOracle {
        calls: Arc<AtomicUsize>,
    }
    #[async_trait]
    impl DistanceOracle for CountingOkOracle {
        async fn distance_km(&self, _from: (f64, f64), seller_id: &str) -> anyhow::Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(seller_id.len() as f64)
        }
    }

    #[tokio::test]
    async fn oracle_outage_falls_back_and_preserves_order() {
        let directory = FixedDirectory {
            sellers: vec!["s1".into(), "s2".into(), "s3".into(), "s4".into(), "s5".into()],
        };
        let oracle = AlwaysFailsOracle;
        let selected = select_sellers(&directory, &oracle, "O1", 3, 5.0).await.unwrap();
        assert_eq!(selected.len(), 3);
        assert!(selected.iter().all(|s| s.distance_km == 5.0));
        assert_eq!(selected[0].seller_id, "s1");
        assert_eq!(selected[1].seller_id, "s2");
        assert_eq!(selected[2].seller_id, "s3");
    }

    #[tokio::test]
    async fn sorts_ascending_and_truncates() {
        let directory = FixedDirectory {
            sellers: vec!["ccc".into(), "a".into(), "bb".into()],
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let oracle = CountingOkOracle { calls: calls.clone() };
        let selected = select_sellers(&directory, &oracle, "O1", 2, 5.0).await.unwrap();
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].seller_id, "a");
        assert_eq!(selected[1].seller_id, "bb");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
