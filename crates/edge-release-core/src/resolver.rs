//! Version resolution against a function platform.
//!
//! Listings are paginated; every page is followed until the provider stops
//! returning a marker. The `$LATEST` alias is never a resolution result.

use edge_providers::{FunctionPlatform, FunctionVersion, ProviderResult};
use serde::Serialize;

/// A resolved published version, or the unpublished sentinel (both fields
/// absent).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedVersion {
    pub version: Option<String>,
    pub function_arn: Option<String>,
}

impl ResolvedVersion {
    pub fn unpublished() -> Self {
        Self::default()
    }

    pub fn is_miss(&self) -> bool {
        self.function_arn.is_none()
    }

    /// Numeric value of the version label; `0` when nothing is published.
    pub fn number(&self) -> u64 {
        self.version
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

impl From<&FunctionVersion> for ResolvedVersion {
    fn from(v: &FunctionVersion) -> Self {
        Self {
            version: Some(v.version.clone()),
            function_arn: Some(v.function_arn.clone()),
        }
    }
}

/// Pick the highest numerically-labelled published version.
///
/// Labels that are not decimal integers are ignored. On a numeric tie the
/// first entry in listing order wins.
pub fn select_latest(versions: &[FunctionVersion]) -> Option<&FunctionVersion> {
    versions
        .iter()
        .filter(|v| !v.is_latest_alias())
        .filter_map(|v| v.version.parse::<u64>().ok().map(|n| (n, v)))
        .fold(None, |best: Option<(u64, &FunctionVersion)>, (n, v)| match best {
            Some((top, _)) if top >= n => best,
            _ => Some((n, v)),
        })
        .map(|(_, v)| v)
}

/// Find the published version whose label equals `label` exactly.
pub fn select_explicit<'a>(versions: &'a [FunctionVersion], label: &str) -> Option<&'a FunctionVersion> {
    versions
        .iter()
        .find(|v| !v.is_latest_alias() && v.version == label)
}

pub struct VersionResolver<'a> {
    platform: &'a dyn FunctionPlatform,
}

impl<'a> VersionResolver<'a> {
    pub fn new(platform: &'a dyn FunctionPlatform) -> Self {
        Self { platform }
    }

    /// Every version the platform lists for `function_name`, across all pages.
    pub async fn list_all(&self, function_name: &str) -> ProviderResult<Vec<FunctionVersion>> {
        let mut versions = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let page = self
                .platform
                .list_versions(function_name, marker.as_deref())
                .await?;
            versions.extend(page.versions);
            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }
        Ok(versions)
    }

    /// Resolve a version label.
    ///
    /// With a non-empty `explicit` label, the version carrying exactly that
    /// label is returned; otherwise the latest published version. A miss is
    /// the unpublished sentinel, not an error.
    pub async fn resolve(
        &self,
        function_name: &str,
        explicit: Option<&str>,
    ) -> ProviderResult<ResolvedVersion> {
        let versions = self.list_all(function_name).await?;
        let found = match explicit.filter(|label| !label.is_empty()) {
            Some(label) => select_explicit(&versions, label),
            None => select_latest(&versions),
        };

        let resolved = found.map(ResolvedVersion::from).unwrap_or_default();
        tracing::debug!(
            function_name = %function_name,
            requested = explicit.unwrap_or("latest"),
            resolved = resolved.version.as_deref().unwrap_or("<none>"),
            "version resolved"
        );
        Ok(resolved)
    }

    /// The version number the next publish is expected to receive.
    pub async fn next_version(&self, function_name: &str) -> ProviderResult<u64> {
        Ok(self.resolve(function_name, None).await?.number() + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_providers::fakes::MemoryFunctionPlatform;
    use edge_providers::ProviderError;

    fn versions(labels: &[&str]) -> Vec<FunctionVersion> {
        labels
            .iter()
            .map(|l| FunctionVersion::new(*l, format!("arn:fn:{l}")))
            .collect()
    }

    #[test]
    fn test_latest_is_numeric_not_lexical() {
        let listed = versions(&["$LATEST", "9", "10", "2"]);
        assert_eq!(select_latest(&listed).unwrap().version, "10");
    }

    #[test]
    fn test_latest_ignores_alias_and_non_numeric() {
        let listed = versions(&["$LATEST", "beta", "3"]);
        assert_eq!(select_latest(&listed).unwrap().version, "3");

        let listed = versions(&["$LATEST"]);
        assert!(select_latest(&listed).is_none());
    }

    #[test]
    fn test_latest_tie_keeps_first() {
        let listed = vec![
            FunctionVersion::new("01", "arn:first"),
            FunctionVersion::new("1", "arn:second"),
        ];
        assert_eq!(select_latest(&listed).unwrap().function_arn, "arn:first");
    }

    #[test]
    fn test_explicit_never_matches_alias() {
        let listed = versions(&["$LATEST", "1"]);
        assert!(select_explicit(&listed, "$LATEST").is_none());
        assert_eq!(select_explicit(&listed, "1").unwrap().function_arn, "arn:fn:1");
    }

    #[tokio::test]
    async fn test_resolve_across_pages() {
        let platform = MemoryFunctionPlatform::new().with_page_size(2);
        platform.insert_function("edge-fn", versions(&["$LATEST", "1", "2", "3", "12", "4"]));

        let resolver = VersionResolver::new(&platform);
        let latest = resolver.resolve("edge-fn", None).await.unwrap();
        assert_eq!(latest.version.as_deref(), Some("12"));
        assert_eq!(latest.function_arn.as_deref(), Some("arn:fn:12"));
        assert_eq!(platform.calls().len(), 3);

        let explicit = resolver.resolve("edge-fn", Some("3")).await.unwrap();
        assert_eq!(explicit.function_arn.as_deref(), Some("arn:fn:3"));
    }

    #[tokio::test]
    async fn test_empty_explicit_means_latest() {
        let platform = MemoryFunctionPlatform::new();
        platform.insert_function("edge-fn", versions(&["$LATEST", "1", "2"]));

        let resolved = VersionResolver::new(&platform)
            .resolve("edge-fn", Some(""))
            .await
            .unwrap();
        assert_eq!(resolved.version.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_miss_is_sentinel() {
        let platform = MemoryFunctionPlatform::new();
        platform.insert_function("edge-fn", versions(&["$LATEST", "1"]));

        let resolver = VersionResolver::new(&platform);
        let resolved = resolver.resolve("edge-fn", Some("7")).await.unwrap();
        assert!(resolved.is_miss());
        assert_eq!(resolved, ResolvedVersion::unpublished());
    }

    #[tokio::test]
    async fn test_next_version() {
        let platform = MemoryFunctionPlatform::new();
        platform.insert_function("fresh", versions(&["$LATEST"]));
        platform.insert_function("busy", versions(&["$LATEST", "1", "41"]));

        let resolver = VersionResolver::new(&platform);
        assert_eq!(resolver.next_version("fresh").await.unwrap(), 1);
        assert_eq!(resolver.next_version("busy").await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let platform = MemoryFunctionPlatform::new();
        let err = VersionResolver::new(&platform)
            .resolve("ghost", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::FunctionNotFound { .. }));
    }
}
