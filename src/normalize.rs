//! Derives the relational entity sets from the flat source table.
//!
//! Derivation order matters: industries and investors first, then startups
//! (which reference industries), funding rounds (which reference startups)
//! and finally the round/investor junction. Each stage receives the
//! natural-key indexes of the stages before it by reference.

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, info_span, warn};

use crate::source::{split_investors, Amount, SourceRecord, SourceTable};

/// Immutable natural key -> surrogate id map.
#[derive(Debug, Clone, Default)]
pub struct KeyIndex {
    ids: HashMap<String, i32>,
}

impl KeyIndex {
    /// Builds an index; when a key repeats, the first id wins.
    pub fn build<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, i32)>,
    {
        let mut ids = HashMap::new();
        for (key, id) in entries {
            ids.entry(key.to_string()).or_insert(id);
        }
        Self { ids }
    }

    pub fn get(&self, key: &str) -> Option<i32> {
        self.ids.get(key).copied()
    }
}

/// Startup name -> every startup id carrying that name, in derivation order.
///
/// A name maps to several ids when it appears with more than one
/// city/industry combination.
#[derive(Debug, Clone, Default)]
pub struct StartupIndex {
    ids: HashMap<String, Vec<i32>>,
}

impl StartupIndex {
    pub fn build<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, i32)>,
    {
        let mut ids: HashMap<String, Vec<i32>> = HashMap::new();
        for (name, id) in entries {
            ids.entry(name.to_string()).or_default().push(id);
        }
        Self { ids }
    }

    /// Startups a funding round row is joined to.
    pub fn round_targets(&self, name: &str, policy: DuplicateNames) -> &[i32] {
        let Some(ids) = self.ids.get(name) else {
            return &[];
        };
        match policy {
            DuplicateNames::FanOut => ids,
            DuplicateNames::FirstStartup => &ids[..ids.len().min(1)],
        }
    }

    /// Startup whose rounds receive a row's investors.
    pub fn link_target(&self, name: &str, policy: DuplicateNames) -> Option<i32> {
        let ids = self.ids.get(name)?;
        match policy {
            DuplicateNames::FanOut => ids.last().copied(),
            DuplicateNames::FirstStartup => ids.first().copied(),
        }
    }
}

/// Which funding round an investor list is attached to.
///
/// The export does not say which round an investor cell belongs to when a
/// startup raised several times, so one round per startup is picked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum RoundSelection {
    /// The startup's first round in derivation order.
    #[default]
    First,
    /// The startup's last round in derivation order.
    Last,
}

/// How rows are joined to startups whose name appears with more than one
/// city/industry combination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DuplicateNames {
    /// A round row yields one round per startup carrying the name; investor
    /// lists follow the last startup carrying it.
    #[default]
    FanOut,
    /// Rounds and investor lists both go to the first startup carrying the
    /// name.
    FirstStartup,
}

/// What happens to a round whose amount cell is present but not a number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum UnparsedAmounts {
    /// Keep the round with an empty amount.
    #[default]
    Keep,
    /// Treat the amount as missing, which drops the round.
    Exclude,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizerOptions {
    pub round_selection: RoundSelection,
    pub duplicate_names: DuplicateNames,
    pub unparsed_amounts: UnparsedAmounts,
    /// Log every investor token that has no investor entity.
    pub warn_unresolved_investors: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Industry {
    pub industry_id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Investor {
    pub investor_id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Startup {
    pub startup_id: i32,
    pub name: String,
    pub city: Option<String>,
    pub industry_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingRound {
    pub round_id: i32,
    pub startup_id: i32,
    pub date: NaiveDate,
    pub round_type: String,
    /// Empty when the export gave a non-numeric amount.
    pub amount_usd: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoundInvestor {
    pub round_id: i32,
    pub investor_id: i32,
}

/// What the derivation dropped or could not resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DerivationReport {
    pub rows_without_startup: usize,
    pub incomplete_rounds: usize,
    pub unmatched_rounds: usize,
    pub rows_without_rounds: usize,
    /// Extra rounds produced by joining one row to several same-named startups.
    pub fanned_out_rounds: usize,
    /// Rounds kept with an empty amount.
    pub rounds_without_amount: usize,
    pub duplicate_links: usize,
    /// Distinct investor tokens with no investor entity, first-seen order.
    pub unresolved_investors: Vec<String>,
    /// Startup names derived more than once with different city/industry.
    pub ambiguous_startups: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub industries: u64,
    pub investors: u64,
    pub startups: u64,
    pub funding_rounds: u64,
    pub round_investors: u64,
}

/// All five derived entity sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub industries: Vec<Industry>,
    pub investors: Vec<Investor>,
    pub startups: Vec<Startup>,
    pub funding_rounds: Vec<FundingRound>,
    pub round_investors: Vec<RoundInvestor>,
    pub report: DerivationReport,
}

impl Normalized {
    pub fn summary(&self) -> TableCounts {
        TableCounts {
            industries: self.industries.len() as u64,
            investors: self.investors.len() as u64,
            startups: self.startups.len() as u64,
            funding_rounds: self.funding_rounds.len() as u64,
            round_investors: self.round_investors.len() as u64,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    options: NormalizerOptions,
}

impl Normalizer {
    pub fn new(options: NormalizerOptions) -> Self {
        Self { options }
    }

    /// Runs every derivation over `table`. Pure: the same table always
    /// yields the same entities and ids.
    pub fn normalize(&self, table: &SourceTable) -> Normalized {
        let _span = info_span!("normalize", source_rows = table.len()).entered();
        let mut report = DerivationReport::default();

        let rows: Vec<&SourceRecord> = table
            .records
            .iter()
            .filter(|r| r.startup_name.is_some())
            .collect();
        report.rows_without_startup = table.len() - rows.len();
        if report.rows_without_startup > 0 {
            info!(count = report.rows_without_startup, "Excluding rows without a startup name");
        }

        let (industries, industry_index) = derive_industries(&rows);
        let (investors, investor_index) = derive_investors(&rows);
        let (startups, startup_index) = derive_startups(&rows, &industry_index, &mut report);
        let funding_rounds =
            derive_funding_rounds(&rows, &startup_index, &self.options, &mut report);
        let round_investors = derive_round_investors(
            &rows,
            &startup_index,
            &funding_rounds,
            &investor_index,
            &self.options,
            &mut report,
        );

        let normalized = Normalized {
            industries,
            investors,
            startups,
            funding_rounds,
            round_investors,
            report,
        };
        let counts = normalized.summary();
        info!(
            industries = counts.industries,
            investors = counts.investors,
            startups = counts.startups,
            funding_rounds = counts.funding_rounds,
            round_investors = counts.round_investors,
            "Derived entity sets"
        );
        normalized
    }
}

/// Distinct trimmed industry names in first-seen order.
pub fn derive_industries(rows: &[&SourceRecord]) -> (Vec<Industry>, KeyIndex) {
    let names = rows
        .iter()
        .filter_map(|r| r.industry.as_deref())
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let (industries, index) = assign_ids(names);
    let industries = industries
        .into_iter()
        .map(|(industry_id, name)| Industry { industry_id, name })
        .collect();
    (industries, index)
}

/// Distinct investor names after splitting every cell on commas.
pub fn derive_investors(rows: &[&SourceRecord]) -> (Vec<Investor>, KeyIndex) {
    let names = rows
        .iter()
        .filter_map(|r| r.investors.as_deref())
        .flat_map(split_investors);

    let (investors, index) = assign_ids(names);
    let investors = investors
        .into_iter()
        .map(|(investor_id, name)| Investor { investor_id, name })
        .collect();
    (investors, index)
}

/// One startup per distinct (name, city, industry) tuple.
///
/// The industry is outer-joined: a missing or unknown industry leaves
/// `industry_id` empty but keeps the startup.
pub fn derive_startups(
    rows: &[&SourceRecord],
    industries: &KeyIndex,
    report: &mut DerivationReport,
) -> (Vec<Startup>, StartupIndex) {
    let mut seen: HashSet<(&str, Option<&str>, Option<&str>)> = HashSet::new();
    let mut names: HashSet<&str> = HashSet::new();
    let mut startups: Vec<Startup> = Vec::new();

    for row in rows {
        let Some(name) = row.startup_name.as_deref() else {
            continue;
        };
        let key = (name, row.city.as_deref(), row.industry.as_deref());
        if !seen.insert(key) {
            continue;
        }

        if !names.insert(name) && !report.ambiguous_startups.iter().any(|n| n == name) {
            warn!(
                startup = name,
                line = row.line,
                "Startup appears with more than one city/industry combination"
            );
            report.ambiguous_startups.push(name.to_string());
        }

        startups.push(Startup {
            startup_id: next_id(startups.len()),
            name: name.to_string(),
            city: row.city.clone(),
            industry_id: row
                .industry
                .as_deref()
                .and_then(|industry| industries.get(industry.trim())),
        });
    }

    let index = StartupIndex::build(startups.iter().map(|s| (s.name.as_str(), s.startup_id)));
    (startups, index)
}

/// Rounds for rows with every round field present and a known startup.
///
/// Under [`DuplicateNames::FanOut`] a row whose startup name maps to several
/// startups yields one round for each of them, in startup order.
pub fn derive_funding_rounds(
    rows: &[&SourceRecord],
    startups: &StartupIndex,
    options: &NormalizerOptions,
    report: &mut DerivationReport,
) -> Vec<FundingRound> {
    let mut rounds = Vec::new();

    for row in rows {
        let amount = match (&row.amount_usd, options.unparsed_amounts) {
            (Some(Amount::Unparsed(_)), UnparsedAmounts::Exclude) => None,
            (amount, _) => amount.as_ref(),
        };
        let (Some(name), Some(date), Some(round_type), Some(amount)) = (
            row.startup_name.as_deref(),
            row.date,
            row.round_type.as_deref(),
            amount,
        ) else {
            debug!(line = row.line, "Row lacks round fields; no funding round derived");
            report.incomplete_rounds += 1;
            continue;
        };

        let targets = startups.round_targets(name, options.duplicate_names);
        if targets.is_empty() {
            report.unmatched_rounds += 1;
            continue;
        }
        report.fanned_out_rounds += targets.len() - 1;

        for &startup_id in targets {
            let amount_usd = amount.usd();
            if amount_usd.is_none() {
                report.rounds_without_amount += 1;
            }
            rounds.push(FundingRound {
                round_id: next_id(rounds.len()),
                startup_id,
                date,
                round_type: round_type.to_string(),
                amount_usd,
            });
        }
    }

    rounds
}

/// Links each row's investors to one round of the row's startup.
///
/// Pairs are deduplicated, keeping first-seen order.
pub fn derive_round_investors(
    rows: &[&SourceRecord],
    startups: &StartupIndex,
    rounds: &[FundingRound],
    investors: &KeyIndex,
    options: &NormalizerOptions,
    report: &mut DerivationReport,
) -> Vec<RoundInvestor> {
    let round_index = RoundIndex::build(rounds);
    let mut seen: HashSet<RoundInvestor> = HashSet::new();
    let mut links = Vec::new();

    for row in rows {
        let (Some(name), Some(cell)) = (row.startup_name.as_deref(), row.investors.as_deref())
        else {
            continue;
        };
        let Some(startup_id) = startups.link_target(name, options.duplicate_names) else {
            continue;
        };
        let Some(round_id) = round_index.select(startup_id, options.round_selection) else {
            report.rows_without_rounds += 1;
            continue;
        };

        for token in split_investors(cell) {
            let Some(investor_id) = investors.get(token) else {
                if options.warn_unresolved_investors {
                    warn!(investor = token, line = row.line, "Investor has no matching entity");
                }
                if !report.unresolved_investors.iter().any(|n| n == token) {
                    report.unresolved_investors.push(token.to_string());
                }
                continue;
            };

            let link = RoundInvestor {
                round_id,
                investor_id,
            };
            if seen.insert(link) {
                links.push(link);
            } else {
                report.duplicate_links += 1;
            }
        }
    }

    links
}

/// startup_id -> round ids in derivation order.
struct RoundIndex {
    rounds: HashMap<i32, Vec<i32>>,
}

impl RoundIndex {
    fn build(rounds: &[FundingRound]) -> Self {
        let mut by_startup: HashMap<i32, Vec<i32>> = HashMap::new();
        for round in rounds {
            by_startup.entry(round.startup_id).or_default().push(round.round_id);
        }
        Self { rounds: by_startup }
    }

    fn select(&self, startup_id: i32, selection: RoundSelection) -> Option<i32> {
        let rounds = self.rounds.get(&startup_id)?;
        match selection {
            RoundSelection::First => rounds.first().copied(),
            RoundSelection::Last => rounds.last().copied(),
        }
    }
}

fn assign_ids<'a, I>(names: I) -> (Vec<(i32, String)>, KeyIndex)
where
    I: Iterator<Item = &'a str>,
{
    let mut seen: HashSet<&str> = HashSet::new();
    let mut entries: Vec<(i32, String)> = Vec::new();
    for name in names {
        if seen.insert(name) {
            entries.push((next_id(entries.len()), name.to_string()));
        }
    }
    let index = KeyIndex::build(entries.iter().map(|(id, name)| (name.as_str(), *id)));
    (entries, index)
}

/// Surrogate ids are 1-based.
fn next_id(count: usize) -> i32 {
    count as i32 + 1
}
