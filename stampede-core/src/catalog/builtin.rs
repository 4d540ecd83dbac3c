//! Built-in catalogs for the expectation service
//!
//! `steady` measures throughput and correctness under nominal load.
//! `nightmare` deliberately drives known failure modes (hot keys, executor
//! saturation, lock fallback, deep paging) and watches the degradation.

use super::{
    CatalogProfile, ScenarioCatalog, ScenarioDefinition, WarmupPlan, WarmupTarget,
};
use crate::classifier::ClassifierPolicy;
use crate::error::CatalogError;
use stampede_http::HttpMethod;
use std::collections::{BTreeMap, BTreeSet};

/// Characters known to exist in the target database
pub const TEST_CHARACTERS: &[&str] = &[
    "아델",
    "진격캐넌",
    "글자",
    "뉴비렌붕잉",
    "긱델",
    "고딩",
    "물주",
    "쯔단",
    "강은호",
    "팀에이컴퍼니",
    "흡혈",
    "꾸장",
];

/// Small pool for v4 so the in-process cache stays hot
pub const V4_CHARACTERS: &[&str] = &["강은호", "아델", "긱델"];

/// Primed before the measured loop starts
pub const WARMUP_CHARACTERS: &[&str] = &["강은호", "아델"];

/// Single identifier hammered by the thundering-herd scenario
pub const HOT_KEY_CHARACTERS: &[&str] = &["강은호"];

pub const DEEP_PAGE_NUMBERS: &[u32] = &[1, 10, 100, 500, 1000];

const USER_IGN: &str = "userIgn";
const LIKE_CODES: [&str; 2] = ["DUPLICATE_LIKE", "SELF_LIKE_NOT_ALLOWED"];

fn expectation_policy() -> ClassifierPolicy {
    ClassifierPolicy {
        required_fields: vec!["userIgn".into(), "totalCost".into(), "items".into()],
        check_item_counts: true,
        ..ClassifierPolicy::default()
    }
}

/// Steady-state catalog
pub fn steady() -> Result<ScenarioCatalog, CatalogError> {
    let mut catalog = ScenarioCatalog::new("steady", CatalogProfile::Steady);

    catalog.add_policy("expectation", expectation_policy());
    catalog.add_policy(
        "expectation_v4",
        ClassifierPolicy {
            required_fields: vec!["userIgn".into(), "totalExpectedCost".into()],
            ..ClassifierPolicy::default()
        },
    );
    catalog.add_policy(
        "like",
        ClassifierPolicy {
            auth_sensitive: true,
            ..ClassifierPolicy::default()
        },
    );

    catalog.register(
        ScenarioDefinition::new(
            "v3_expectation",
            HttpMethod::Get,
            "/api/v3/characters/{userIgn}/expectation",
        )
        .tags(["v3"])
        .weight(3)
        .policy("expectation")
        .param(USER_IGN, TEST_CHARACTERS.iter().copied()),
    )?;

    catalog.register(
        ScenarioDefinition::new(
            "v2_expectation",
            HttpMethod::Get,
            "/api/v2/characters/{userIgn}/expectation",
        )
        .tags(["v2"])
        .weight(1)
        .policy("expectation")
        .param(USER_IGN, TEST_CHARACTERS.iter().copied()),
    )?;

    catalog.register(
        ScenarioDefinition::new(
            "v4_expectation",
            HttpMethod::Get,
            "/api/v4/characters/{userIgn}/expectation",
        )
        .tags(["v4"])
        .weight(3)
        .header("Accept-Encoding", "gzip")
        .policy("expectation_v4")
        .param(USER_IGN, V4_CHARACTERS.iter().copied()),
    )?;

    catalog.register(
        ScenarioDefinition::new(
            "like_authenticated",
            HttpMethod::Post,
            "/api/v2/characters/{userIgn}/like",
        )
        .tags(["like_sync_test"])
        .weight(1)
        .policy("like")
        .expected_codes(LIKE_CODES)
        .auth_required()
        .exclude_login_identity()
        .param(USER_IGN, TEST_CHARACTERS.iter().copied()),
    )?;

    catalog.set_warmup(WarmupPlan {
        targets: WARMUP_CHARACTERS
            .iter()
            .map(|character| WarmupTarget {
                name: format!("warmup_v3_{}", character),
                method: HttpMethod::Get,
                endpoint: "/api/v3/characters/{userIgn}/expectation".to_string(),
                params: BTreeMap::from([(USER_IGN.to_string(), character.to_string())]),
            })
            .collect(),
        skip_when_tags: BTreeSet::from(["v4".to_string()]),
    });

    Ok(catalog)
}

/// Chaos catalog
pub fn nightmare() -> Result<ScenarioCatalog, CatalogError> {
    let mut catalog = ScenarioCatalog::new("nightmare", CatalogProfile::Chaos);

    catalog.add_policy("resilience", ClassifierPolicy::default());
    catalog.add_policy(
        "lock",
        ClassifierPolicy {
            auth_sensitive: true,
            accepted_statuses: vec![409],
            ..ClassifierPolicy::default()
        },
    );
    catalog.add_policy(
        "pagination",
        ClassifierPolicy {
            accepted_statuses: vec![404],
            extract_page_stats: true,
            ..ClassifierPolicy::default()
        },
    );
    catalog.add_policy(
        "health",
        ClassifierPolicy {
            require_json: false,
            ..ClassifierPolicy::default()
        },
    );

    let v3 = "/api/v3/characters/{userIgn}/expectation";

    catalog.register(
        ScenarioDefinition::new("n08_hot_key", HttpMethod::Get, v3)
            .tags(["n08", "thundering_herd", "redis_death"])
            .weight(10)
            .policy("resilience")
            .param(USER_IGN, HOT_KEY_CHARACTERS.iter().copied()),
    )?;

    catalog.register(
        ScenarioDefinition::new("n08_distributed", HttpMethod::Get, v3)
            .tags(["n08"])
            .weight(1)
            .policy("resilience")
            .param(USER_IGN, TEST_CHARACTERS.iter().copied()),
    )?;

    catalog.register(
        ScenarioDefinition::new("n10_async_trigger", HttpMethod::Get, v3)
            .tags(["n10", "threadpool", "caller_runs"])
            .weight(1)
            .policy("resilience")
            .expected_timeout()
            .slow_warning_ms(5000)
            .pacing(0.05, 0.2)
            .param(USER_IGN, TEST_CHARACTERS.iter().copied()),
    )?;

    catalog.register(
        ScenarioDefinition::new(
            "n11_lock_request",
            HttpMethod::Post,
            "/api/v2/characters/{userIgn}/like",
        )
        .tags(["n11", "lock_fallback", "connection_pool"])
        .weight(1)
        .policy("lock")
        .expected_codes(LIKE_CODES)
        .auth_required()
        .exclude_login_identity()
        .pacing(0.2, 0.5)
        .param(USER_IGN, TEST_CHARACTERS.iter().copied()),
    )?;

    for &page in DEEP_PAGE_NUMBERS {
        let mut definition = ScenarioDefinition::new(
            format!("n18_page_{}", page),
            HttpMethod::Get,
            format!("/api/v2/characters?page={}&size=10", page),
        )
        .tags(["n18"])
        .weight(1)
        .policy("pagination")
        .pacing(1.0, 2.0);
        if page == 1 {
            definition = definition.tags(["deep_paging", "pagination"]);
        }
        if page >= 100 {
            definition = definition.slow_warning_ms(100);
        }
        catalog.register(definition)?;
    }

    catalog.register(
        ScenarioDefinition::new("general_v3", HttpMethod::Get, v3)
            .tags(["general", "v3"])
            .weight(3)
            .policy("resilience")
            .pacing(0.5, 2.0)
            .param(USER_IGN, TEST_CHARACTERS.iter().copied()),
    )?;

    catalog.register(
        ScenarioDefinition::new(
            "general_v2",
            HttpMethod::Get,
            "/api/v2/characters/{userIgn}/expectation",
        )
        .tags(["general", "v2"])
        .weight(1)
        .policy("resilience")
        .pacing(0.5, 2.0)
        .param(USER_IGN, TEST_CHARACTERS.iter().copied()),
    )?;

    catalog.register(
        ScenarioDefinition::new("general_health", HttpMethod::Get, "/actuator/health")
            .tags(["general"])
            .weight(2)
            .policy("health")
            .pacing(0.5, 2.0),
    )?;

    catalog.add_hint(
        "n10",
        "executor saturation: caller-runs rejection blocking request threads",
    );
    catalog.add_hint("n11", "connection pool exhaustion from lock fallback");
    catalog.add_hint("n08", "thundering herd on cache fallback");

    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TagFilter;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;

    #[test]
    fn test_builtin_catalogs_build() {
        let steady = steady().unwrap();
        assert_eq!(steady.scenarios().len(), 4);
        assert_eq!(steady.profile(), CatalogProfile::Steady);

        let nightmare = nightmare().unwrap();
        assert_eq!(nightmare.scenarios().len(), 12);
        assert_eq!(nightmare.profile(), CatalogProfile::Chaos);
        assert!(nightmare.hint_for("n10").is_some());
    }

    #[test]
    fn test_steady_tag_selection() {
        let steady = steady().unwrap();
        let v3 = steady.candidates(&TagFilter::new(["v3"], Vec::<String>::new()));
        assert_eq!(v3.len(), 1);
        assert_eq!(v3[0].name(), "v3_expectation");
        assert_eq!(v3[0].weight(), 3);

        let like = steady.get("like_authenticated").unwrap();
        assert!(like.definition.auth_required);
        assert!(like.policy.auth_sensitive);
        assert!(like.definition.expected_codes.contains("DUPLICATE_LIKE"));
    }

    #[test]
    fn test_steady_warmup_skipped_for_v4() {
        let steady = steady().unwrap();
        assert_eq!(steady.warmup().targets_for(&TagFilter::all()).len(), 2);
        assert!(steady
            .warmup()
            .targets_for(&TagFilter::new(["v4"], Vec::<String>::new()))
            .is_empty());
    }

    #[test]
    fn test_nightmare_paging_and_timeouts() {
        let nightmare = nightmare().unwrap();
        let pages = nightmare.candidates(&TagFilter::new(["n18"], Vec::<String>::new()));
        assert_eq!(pages.len(), 5);

        let deep = nightmare.get("n18_page_1000").unwrap();
        assert_eq!(deep.definition.slow_warning_ms, Some(100));
        assert!(deep.policy.accepted_statuses.contains(&404));
        assert!(nightmare.get("n18_page_1").unwrap().tags().contains("pagination"));

        let trigger = nightmare.get("n10_async_trigger").unwrap();
        assert!(trigger.definition.expected_timeout);
    }

    #[test]
    fn test_nightmare_group_pacing() {
        let nightmare = nightmare().unwrap();
        let mut rng = StdRng::seed_from_u64(18);

        for page in nightmare.candidates(&TagFilter::new(["n18"], Vec::<String>::new())) {
            let pacing = page.pacing().unwrap();
            for _ in 0..200 {
                let pause = pacing.sample(&mut rng);
                assert!(
                    pause >= Duration::from_secs(1) && pause <= Duration::from_secs(2),
                    "{} paused {:?}",
                    page.name(),
                    pause
                );
            }
        }

        let range = |name: &str| {
            let pacing = nightmare.get(name).unwrap().pacing().unwrap();
            (pacing.min(), pacing.max())
        };
        assert_eq!(range("n10_async_trigger"), (Duration::from_millis(50), Duration::from_millis(200)));
        assert_eq!(range("n11_lock_request"), (Duration::from_millis(200), Duration::from_millis(500)));
        assert_eq!(range("general_health"), (Duration::from_millis(500), Duration::from_secs(2)));
        assert!(nightmare.get("n08_hot_key").unwrap().pacing().is_none());
    }
}
