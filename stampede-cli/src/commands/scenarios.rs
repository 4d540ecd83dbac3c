//! `stampede scenarios`

use anyhow::{Context, Result};
use stampede_config::StampedeConfig;
use stampede_core::{CatalogFile, ScenarioCatalog, TagFilter, TaskScheduler};
use std::fmt::Write;

pub struct ScenariosArgs<'a> {
    pub catalog: Option<&'a str>,
    pub tags: &'a [String],
    pub exclude_tags: &'a [String],
    pub yaml: bool,
}

pub fn execute(config: &StampedeConfig, args: ScenariosArgs<'_>) -> Result<()> {
    let name = args.catalog.unwrap_or(&config.run.catalog);
    let catalog = ScenarioCatalog::load(name)
        .with_context(|| format!("Failed to load catalog '{}'", name))?;

    if args.yaml {
        let yaml = serde_yaml::to_string(&CatalogFile::from(&catalog))
            .context("Failed to serialize catalog")?;
        print!("{}", yaml);
        return Ok(());
    }

    let filter = if args.tags.is_empty() && args.exclude_tags.is_empty() {
        TagFilter::new(config.run.tags.iter().cloned(), config.run.exclude_tags.iter().cloned())
    } else {
        TagFilter::new(args.tags.iter().cloned(), args.exclude_tags.iter().cloned())
    };

    print!("{}", render(&catalog, &filter)?);
    Ok(())
}

/// Catalog listing followed by the candidate set of `filter`
pub fn render(catalog: &ScenarioCatalog, filter: &TagFilter) -> Result<String> {
    let mut out = String::new();
    let pacing = catalog.pacing();
    writeln!(
        out,
        "Catalog: {} ({}), pacing {}-{}s, failure threshold {:.2}%",
        catalog.name(),
        catalog.profile(),
        pacing.min_wait,
        pacing.max_wait,
        catalog.profile().default_failure_threshold() * 100.0
    )?;

    for scenario in catalog.scenarios() {
        let definition = &scenario.definition;
        let mut flags = Vec::new();
        if definition.auth_required {
            flags.push("auth");
        }
        if definition.expected_timeout {
            flags.push("expected-timeout");
        }
        if definition.weight == 0 {
            flags.push("disabled");
        }
        writeln!(
            out,
            "  {:<24} {:<6} {:<48} w={:<3} tags=[{}] {}",
            definition.name,
            definition.method.as_str(),
            definition.endpoint,
            definition.weight,
            definition.tags.iter().cloned().collect::<Vec<_>>().join(", "),
            flags.join(" ")
        )?;
    }

    let scheduler = TaskScheduler::new(catalog, filter)?;
    writeln!(out, "Filter {} selects:", filter)?;
    for (name, share) in scheduler.shares() {
        writeln!(out, "  {:<24} {:>5.1}%", name, share * 100.0)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_shows_candidate_shares() {
        let catalog = ScenarioCatalog::load("steady").unwrap();
        let filter = TagFilter::new(["v3", "v2"], Vec::<String>::new());
        let listing = render(&catalog, &filter).unwrap();

        assert!(listing.starts_with("Catalog: steady (steady)"));
        assert!(listing.contains("like_authenticated"));
        let share = |name: &str| {
            listing
                .lines()
                .skip_while(|line| !line.starts_with("Filter"))
                .find(|line| line.trim_start().starts_with(name))
                .map(|line| line.trim_end().to_string())
        };
        assert!(share("v3_expectation").unwrap().ends_with("75.0%"));
        assert!(share("v2_expectation").unwrap().ends_with("25.0%"));
        assert!(share("v4_expectation").is_none());
    }

    #[test]
    fn test_empty_filter_is_reported() {
        let catalog = ScenarioCatalog::load("nightmare").unwrap();
        let filter = TagFilter::new(["missing"], Vec::<String>::new());
        let err = render(&catalog, &filter).unwrap_err();
        assert!(err.to_string().contains("No scenario matches"));
    }
}
