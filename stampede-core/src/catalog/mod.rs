//! Scenario catalog
//!
//! A catalog is an explicit table of [`ScenarioDefinition`]s, the classifier
//! policies they reference, warm-up targets and per-tag degradation hints.
//! It is built once before the run starts and never mutated afterwards.

pub mod builtin;
pub mod file;

pub use file::CatalogFile;

use crate::classifier::{ClassifierPolicy, ClassifyContext};
use crate::error::CatalogError;
use crate::scheduler::Pacing;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use stampede_config::validation::Validatable;
use stampede_config::PacingOverride;
use stampede_http::HttpMethod;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Kind of run a catalog is meant for; sets the default failure threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogProfile {
    #[default]
    Steady,
    Chaos,
}

impl CatalogProfile {
    /// Failure ratio above which the run raises an alert
    pub fn default_failure_threshold(self) -> f64 {
        match self {
            CatalogProfile::Steady => 0.01,
            CatalogProfile::Chaos => 0.05,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CatalogProfile::Steady => "steady",
            CatalogProfile::Chaos => "chaos",
        }
    }
}

impl fmt::Display for CatalogProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named, weighted, taggable unit of work
///
/// `endpoint` may contain `{name}` placeholders (in path segments or query
/// values); each one is filled per request by a uniform draw from
/// `params[name]`, and percent-encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    pub name: String,

    #[serde(default)]
    pub method: HttpMethod,

    pub endpoint: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<JsonValue>,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Relative weight; 0 disables the scenario
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Name of a policy registered in the same catalog
    pub policy: String,

    /// Business error codes that count as expected exceptions
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub expected_codes: BTreeSet<String>,

    /// Accept 503s, client timeouts and slow responses as valid outcomes
    #[serde(default)]
    pub expected_timeout: bool,

    /// Only users holding an auth token may run it
    #[serde(default)]
    pub auth_required: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Vec<String>>,

    /// Drop the login identity from every parameter pool
    #[serde(default)]
    pub exclude_login_identity: bool,

    /// Log a warning when a request takes longer than this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slow_warning_ms: Option<u64>,

    /// Wait range after this scenario, replacing the catalog default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pacing: Option<PacingOverride>,
}

fn default_weight() -> u32 {
    1
}

impl ScenarioDefinition {
    pub fn new(name: impl Into<String>, method: HttpMethod, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            endpoint: endpoint.into(),
            headers: BTreeMap::new(),
            body: None,
            tags: BTreeSet::new(),
            weight: default_weight(),
            policy: String::new(),
            expected_codes: BTreeSet::new(),
            expected_timeout: false,
            auth_required: false,
            params: BTreeMap::new(),
            exclude_login_identity: false,
            slow_warning_ms: None,
            pacing: None,
        }
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn policy(mut self, policy: impl Into<String>) -> Self {
        self.policy = policy.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    pub fn param<I, S>(mut self, name: impl Into<String>, pool: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params
            .insert(name.into(), pool.into_iter().map(Into::into).collect());
        self
    }

    pub fn expected_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_codes.extend(codes.into_iter().map(Into::into));
        self
    }

    pub fn expected_timeout(mut self) -> Self {
        self.expected_timeout = true;
        self
    }

    pub fn auth_required(mut self) -> Self {
        self.auth_required = true;
        self
    }

    pub fn exclude_login_identity(mut self) -> Self {
        self.exclude_login_identity = true;
        self
    }

    pub fn slow_warning_ms(mut self, millis: u64) -> Self {
        self.slow_warning_ms = Some(millis);
        self
    }

    /// Wait between `min_wait` and `max_wait` seconds after this scenario
    pub fn pacing(mut self, min_wait: f64, max_wait: f64) -> Self {
        self.pacing = Some(PacingOverride { min_wait, max_wait });
        self
    }

    fn check_template(&self) -> Result<(), CatalogError> {
        let invalid = |message: String| CatalogError::InvalidTemplate {
            scenario: self.name.clone(),
            message,
        };

        if !self.endpoint.starts_with('/') {
            return Err(invalid(format!("'{}' must start with '/'", self.endpoint)));
        }

        let names = placeholders(&self.endpoint).map_err(invalid)?;
        for name in &names {
            let has_values = self.params.get(name).is_some_and(|pool| !pool.is_empty());
            if !has_values {
                return Err(CatalogError::MissingParameterPool {
                    scenario: self.name.clone(),
                    param: name.clone(),
                });
            }
        }
        if let Some(unused) = self.params.keys().find(|key| !names.contains(key)) {
            return Err(invalid(format!(
                "parameter pool '{}' has no placeholder in the endpoint",
                unused
            )));
        }
        Ok(())
    }
}

/// A registered scenario with its resolved policy
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub definition: ScenarioDefinition,
    pub policy: ClassifierPolicy,
}

impl Scenario {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn weight(&self) -> u32 {
        self.definition.weight
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.definition.tags
    }

    /// Own wait range, if the scenario overrides the catalog default
    pub fn pacing(&self) -> Option<Pacing> {
        self.definition.pacing.map(Pacing::from)
    }

    /// Classifier input for this scenario
    pub fn context(&self, expected_timeout_threshold: Duration) -> ClassifyContext<'_> {
        ClassifyContext {
            policy: &self.policy,
            expected_codes: &self.definition.expected_codes,
            expected_timeout: self
                .definition
                .expected_timeout
                .then_some(expected_timeout_threshold),
        }
    }

    /// Whether every parameter pool still has a value once `login_identity` is removed
    pub fn renderable_for(&self, login_identity: Option<&str>) -> bool {
        self.definition
            .params
            .values()
            .all(|pool| pool.iter().any(|value| !self.excludes(value, login_identity)))
    }

    /// Concrete request URL with placeholders drawn from the pools
    pub fn render_url<R: Rng + ?Sized>(
        &self,
        base: &Url,
        rng: &mut R,
        login_identity: Option<&str>,
    ) -> Result<Url, CatalogError> {
        let mut chosen = BTreeMap::new();
        for (param, pool) in &self.definition.params {
            let candidates: Vec<&String> = pool
                .iter()
                .filter(|value| !self.excludes(value, login_identity))
                .collect();
            let value = candidates.choose(rng).ok_or_else(|| CatalogError::Render {
                scenario: self.name().to_string(),
                message: format!("pool '{}' is empty after excluding the login identity", param),
            })?;
            chosen.insert(param.as_str(), value.as_str());
        }

        render_endpoint(base, &self.definition.endpoint, &chosen).map_err(|message| {
            CatalogError::Render {
                scenario: self.name().to_string(),
                message,
            }
        })
    }

    fn excludes(&self, value: &str, login_identity: Option<&str>) -> bool {
        self.definition.exclude_login_identity && login_identity == Some(value)
    }
}

/// Active include/exclude tag filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    include: BTreeSet<String>,
    exclude: BTreeSet<String>,
}

impl TagFilter {
    pub fn new<I, E, S, T>(include: I, exclude: E) -> Self
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            include: include.into_iter().map(Into::into).collect(),
            exclude: exclude.into_iter().map(Into::into).collect(),
        }
    }

    /// Filter that matches every scenario
    pub fn all() -> Self {
        Self::default()
    }

    /// An empty include set matches everything not excluded
    pub fn matches(&self, tags: &BTreeSet<String>) -> bool {
        let included = self.include.is_empty() || !self.include.is_disjoint(tags);
        included && self.exclude.is_disjoint(tags)
    }

    pub fn includes(&self, tag: &str) -> bool {
        self.include.contains(tag)
    }

    pub fn include_tags(&self) -> &BTreeSet<String> {
        &self.include
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |set: &BTreeSet<String>| set.iter().cloned().collect::<Vec<_>>().join(", ");
        if self.include.is_empty() {
            write!(f, "[all]")?;
        } else {
            write!(f, "[{}]", join(&self.include))?;
        }
        if !self.exclude.is_empty() {
            write!(f, " excluding [{}]", join(&self.exclude))?;
        }
        Ok(())
    }
}

/// Requests issued once per user to prime downstream caches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WarmupPlan {
    #[serde(default)]
    pub targets: Vec<WarmupTarget>,

    /// Warm-up is skipped when the active filter includes any of these
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub skip_when_tags: BTreeSet<String>,
}

impl WarmupPlan {
    /// Targets to run under `filter`, empty when warm-up is skipped
    pub fn targets_for(&self, filter: &TagFilter) -> Vec<WarmupTarget> {
        if self.skip_when_tags.iter().any(|tag| filter.includes(tag)) {
            return Vec::new();
        }
        self.targets.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarmupTarget {
    pub name: String,

    #[serde(default)]
    pub method: HttpMethod,

    pub endpoint: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl WarmupTarget {
    pub fn render_url(&self, base: &Url) -> Result<Url, CatalogError> {
        let values = self
            .params
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        render_endpoint(base, &self.endpoint, &values).map_err(|message| CatalogError::Render {
            scenario: self.name.clone(),
            message,
        })
    }
}

/// Registry of scenarios plus everything a run needs to interpret them
#[derive(Debug, Clone)]
pub struct ScenarioCatalog {
    name: String,
    profile: CatalogProfile,
    pacing: PacingOverride,
    policies: BTreeMap<String, ClassifierPolicy>,
    scenarios: Vec<Arc<Scenario>>,
    warmup: WarmupPlan,
    hints: BTreeMap<String, String>,
}

impl ScenarioCatalog {
    pub fn new(name: impl Into<String>, profile: CatalogProfile) -> Self {
        Self {
            name: name.into(),
            profile,
            pacing: PacingOverride {
                min_wait: 0.1,
                max_wait: 0.5,
            },
            policies: BTreeMap::new(),
            scenarios: Vec::new(),
            warmup: WarmupPlan::default(),
            hints: BTreeMap::new(),
        }
    }

    /// Built-in catalog by name, or a YAML catalog file by path
    pub fn load(name_or_path: &str) -> Result<Self, CatalogError> {
        match name_or_path {
            "steady" => builtin::steady(),
            "nightmare" => builtin::nightmare(),
            other if Path::new(other).is_file() => CatalogFile::from_path(other)?.into_catalog(),
            other => Err(CatalogError::UnknownCatalog(other.to_string())),
        }
    }

    /// Names accepted by [`ScenarioCatalog::load`] without a file
    pub fn builtin_names() -> &'static [&'static str] {
        &["steady", "nightmare"]
    }

    /// Default wait range between two iterations of a user
    pub fn set_pacing(&mut self, pacing: PacingOverride) -> Result<(), CatalogError> {
        pacing
            .validate()
            .map_err(|e| CatalogError::InvalidPacing(e.to_string()))?;
        self.pacing = pacing;
        Ok(())
    }

    pub fn add_policy(&mut self, name: impl Into<String>, policy: ClassifierPolicy) {
        self.policies.insert(name.into(), policy);
    }

    /// Register a scenario, resolving its policy by name
    pub fn register(&mut self, definition: ScenarioDefinition) -> Result<(), CatalogError> {
        if self.get(&definition.name).is_some() {
            return Err(CatalogError::DuplicateScenario(definition.name));
        }

        let policy = self
            .policies
            .get(&definition.policy)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownPolicy {
                scenario: definition.name.clone(),
                policy: definition.policy.clone(),
            })?;

        definition.check_template()?;
        if let Some(pacing) = &definition.pacing {
            pacing.validate().map_err(|e| {
                CatalogError::InvalidPacing(format!("scenario '{}': {}", definition.name, e))
            })?;
        }

        self.scenarios
            .push(Arc::new(Scenario { definition, policy }));
        Ok(())
    }

    pub fn set_warmup(&mut self, warmup: WarmupPlan) {
        self.warmup = warmup;
    }

    /// Attach a likely cause to a tag, used to attribute alerts
    pub fn add_hint(&mut self, tag: impl Into<String>, cause: impl Into<String>) {
        self.hints.insert(tag.into(), cause.into());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn profile(&self) -> CatalogProfile {
        self.profile
    }

    pub fn pacing(&self) -> PacingOverride {
        self.pacing
    }

    pub fn policies(&self) -> &BTreeMap<String, ClassifierPolicy> {
        &self.policies
    }

    pub fn scenarios(&self) -> &[Arc<Scenario>] {
        &self.scenarios
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Scenario>> {
        self.scenarios.iter().find(|scenario| scenario.name() == name)
    }

    pub fn by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Arc<Scenario>> + 'a {
        self.scenarios
            .iter()
            .filter(move |scenario| scenario.tags().contains(tag))
    }

    /// Enabled scenarios matching `filter`, in registration order
    pub fn candidates(&self, filter: &TagFilter) -> Vec<Arc<Scenario>> {
        self.scenarios
            .iter()
            .filter(|scenario| scenario.weight() > 0 && filter.matches(scenario.tags()))
            .cloned()
            .collect()
    }

    pub fn warmup(&self) -> &WarmupPlan {
        &self.warmup
    }

    pub fn hints(&self) -> &BTreeMap<String, String> {
        &self.hints
    }

    pub fn hint_for(&self, tag: &str) -> Option<&str> {
        self.hints.get(tag).map(String::as_str)
    }
}

/// Placeholder names in `template`, in order of appearance
fn placeholders(template: &str) -> Result<Vec<String>, String> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find(['{', '}']) {
        if rest[open..].starts_with('}') {
            return Err(format!("unbalanced '}}' in '{}'", template));
        }
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| format!("unclosed '{{' in '{}'", template))?;
        let name = &after[..close];
        if name.is_empty() || name.contains('{') {
            return Err(format!("invalid placeholder in '{}'", template));
        }
        if !names.iter().any(|existing| existing == name) {
            names.push(name.to_string());
        }
        rest = &after[close + 1..];
    }
    Ok(names)
}

/// Fill known placeholders in one pass; substituted values are never rescanned
fn substitute(text: &str, values: &BTreeMap<&str, &str>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let known = after
            .find('}')
            .and_then(|close| values.get(&after[..close]).map(|value| (close, *value)));
        match known {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Join `template` onto `base`, percent-encoding substituted values
fn render_endpoint(
    base: &Url,
    template: &str,
    values: &BTreeMap<&str, &str>,
) -> Result<Url, String> {
    let (path, query) = match template.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (template, None),
    };

    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| format!("'{}' cannot be used as a base URL", base))?;
        segments.pop_if_empty();
        for segment in path.split('/').filter(|segment| !segment.is_empty()) {
            segments.push(&substitute(segment, values));
        }
    }

    if let Some(query) = query {
        let mut pairs = url.query_pairs_mut();
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            pairs.append_pair(&substitute(key, values), &substitute(value, values));
        }
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn catalog() -> ScenarioCatalog {
        let mut catalog = ScenarioCatalog::new("test", CatalogProfile::Steady);
        catalog.add_policy("plain", ClassifierPolicy::default());
        catalog
    }

    #[test]
    fn test_placeholder_parsing() {
        assert_eq!(
            placeholders("/api/v3/characters/{userIgn}/expectation").unwrap(),
            vec!["userIgn".to_string()]
        );
        assert_eq!(placeholders("/actuator/health").unwrap(), Vec::<String>::new());
        assert!(placeholders("/a/{open").is_err());
        assert!(placeholders("/a/close}").is_err());
        assert!(placeholders("/a/{}").is_err());
    }

    #[test]
    fn test_render_encodes_non_ascii_identifiers() {
        let base = Url::parse("http://localhost:8080").unwrap();
        let values = BTreeMap::from([("userIgn", "강은호")]);
        let url = render_endpoint(&base, "/api/v3/characters/{userIgn}/expectation", &values).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/v3/characters/%EA%B0%95%EC%9D%80%ED%98%B8/expectation"
        );

        let values = BTreeMap::from([("userIgn", "a/b")]);
        let url = render_endpoint(&base, "/c/{userIgn}", &values).unwrap();
        assert_eq!(url.path(), "/c/a%2Fb");
    }

    #[test]
    fn test_substituted_values_are_not_rescanned() {
        let values = BTreeMap::from([("a", "{b}"), ("b", "x")]);
        assert_eq!(substitute("{a}-{b}", &values), "{b}-x");
        assert_eq!(substitute("{b}{missing}", &values), "x{missing}");

        let base = Url::parse("http://target").unwrap();
        let url = render_endpoint(&base, "/c/{a}/{b}?q={a}", &values).unwrap();
        assert_eq!(url.path(), "/c/%7Bb%7D/x");
        assert_eq!(url.query_pairs().next().unwrap().1, "{b}");
    }

    #[test]
    fn test_render_keeps_base_path_and_query() {
        let base = Url::parse("http://gateway/prefix/").unwrap();
        let url = render_endpoint(&base, "/api/v2/characters?page=100&size=10", &BTreeMap::new()).unwrap();
        assert_eq!(url.path(), "/prefix/api/v2/characters");
        assert_eq!(url.query(), Some("page=100&size=10"));
    }

    #[test]
    fn test_register_validates_definitions() {
        let mut catalog = catalog();
        let ok = ScenarioDefinition::new("a", HttpMethod::Get, "/x/{id}")
            .policy("plain")
            .param("id", ["1", "2"]);
        catalog.register(ok.clone()).unwrap();

        assert!(matches!(
            catalog.register(ok),
            Err(CatalogError::DuplicateScenario(_))
        ));
        assert!(matches!(
            catalog.register(ScenarioDefinition::new("b", HttpMethod::Get, "/x").policy("missing")),
            Err(CatalogError::UnknownPolicy { .. })
        ));
        assert!(matches!(
            catalog.register(ScenarioDefinition::new("c", HttpMethod::Get, "/x/{id}").policy("plain")),
            Err(CatalogError::MissingParameterPool { .. })
        ));
        assert!(matches!(
            catalog.register(
                ScenarioDefinition::new("d", HttpMethod::Get, "/x")
                    .policy("plain")
                    .param("id", ["1"])
            ),
            Err(CatalogError::InvalidTemplate { .. })
        ));
    }

    #[test]
    fn test_scenario_pacing_is_validated() {
        let mut catalog = catalog();
        catalog
            .register(
                ScenarioDefinition::new("paged", HttpMethod::Get, "/paged")
                    .policy("plain")
                    .pacing(1.0, 2.0),
            )
            .unwrap();
        let pacing = catalog.get("paged").unwrap().pacing().unwrap();
        assert_eq!(pacing.min(), Duration::from_secs(1));
        assert_eq!(pacing.max(), Duration::from_secs(2));

        assert!(matches!(
            catalog.register(
                ScenarioDefinition::new("backwards", HttpMethod::Get, "/b")
                    .policy("plain")
                    .pacing(2.0, 1.0)
            ),
            Err(CatalogError::InvalidPacing(_))
        ));
        assert!(catalog.get("backwards").is_none());
    }

    #[test]
    fn test_candidates_respect_filter_and_zero_weight() {
        let mut catalog = catalog();
        for (name, tags, weight) in [
            ("v3", vec!["v3"], 3),
            ("v2", vec!["v2"], 1),
            ("off", vec!["v3"], 0),
            ("slow", vec!["v3", "slow"], 1),
        ] {
            catalog
                .register(
                    ScenarioDefinition::new(name, HttpMethod::Get, format!("/{}", name))
                        .policy("plain")
                        .tags(tags)
                        .weight(weight),
                )
                .unwrap();
        }

        let names = |filter: TagFilter| {
            catalog
                .candidates(&filter)
                .iter()
                .map(|scenario| scenario.name().to_string())
                .collect::<Vec<_>>()
        };

        assert_eq!(names(TagFilter::all()), vec!["v3", "v2", "slow"]);
        assert_eq!(names(TagFilter::new(["v3"], Vec::<String>::new())), vec!["v3", "slow"]);
        assert_eq!(names(TagFilter::new(["v3"], ["slow"])), vec!["v3"]);
        assert!(names(TagFilter::new(["missing"], Vec::<String>::new())).is_empty());
        assert_eq!(catalog.by_tag("v3").count(), 3);
    }

    #[test]
    fn test_login_identity_is_excluded_from_pools() {
        let mut catalog = catalog();
        catalog
            .register(
                ScenarioDefinition::new("like", HttpMethod::Post, "/like/{userIgn}")
                    .policy("plain")
                    .param("userIgn", ["me", "other"])
                    .exclude_login_identity(),
            )
            .unwrap();
        let scenario = catalog.get("like").unwrap();
        let base = Url::parse("http://target").unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            let url = scenario.render_url(&base, &mut rng, Some("me")).unwrap();
            assert_eq!(url.path(), "/like/other");
        }
        assert!(scenario.renderable_for(Some("me")));

        let mut lonely = catalog.get("like").unwrap().as_ref().clone();
        lonely.definition.params.insert("userIgn".into(), vec!["me".into()]);
        assert!(!lonely.renderable_for(Some("me")));
        assert!(lonely.render_url(&base, &mut rng, Some("me")).is_err());
    }

    #[test]
    fn test_warmup_skipped_for_configured_tags() {
        let plan = WarmupPlan {
            targets: vec![WarmupTarget {
                name: "warmup".into(),
                method: HttpMethod::Get,
                endpoint: "/w/{id}".into(),
                params: BTreeMap::from([("id".to_string(), "1".to_string())]),
            }],
            skip_when_tags: BTreeSet::from(["v4".to_string()]),
        };

        assert_eq!(plan.targets_for(&TagFilter::all()).len(), 1);
        assert!(plan
            .targets_for(&TagFilter::new(["v4"], Vec::<String>::new()))
            .is_empty());

        let base = Url::parse("http://target").unwrap();
        assert_eq!(plan.targets[0].render_url(&base).unwrap().path(), "/w/1");
    }

    #[test]
    fn test_profile_thresholds() {
        assert_eq!(CatalogProfile::Steady.default_failure_threshold(), 0.01);
        assert_eq!(CatalogProfile::Chaos.default_failure_threshold(), 0.05);
    }
}
