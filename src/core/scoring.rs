//! Severity-weighted scoring.
//!
//! Reduces a finding set into per-category scores and one overall score. Pure
//! and deterministic, so it can run on a partial finding set while a scan is
//! still in progress.

use std::collections::{HashMap, HashSet};

use crate::core::catalog::{self, CheckCategory};
use crate::core::knowledge_base;
use crate::core::models::{CategoryScore, Finding, Severity, SeverityCounts, ScoreSummary};

const PERFECT: i64 = 100;

/// Points removed per finding of the given severity. `Info` never penalizes.
pub fn penalty(severity: Severity) -> i64 {
    match severity {
        Severity::Critical => 20,
        Severity::High => 10,
        Severity::Medium => 5,
        Severity::Low => 2,
        Severity::Info => 0,
    }
}

/// `clamp(100 - 20c - 10h - 5m - 2l, 0, 100)`.
pub fn score_counts(counts: &SeverityCounts) -> u8 {
    let deduction: i64 = [Severity::Critical, Severity::High, Severity::Medium, Severity::Low]
        .into_iter()
        .map(|s| penalty(s) * counts.get(s) as i64)
        .sum();
    (PERFECT - deduction).clamp(0, PERFECT) as u8
}

/// Scores `findings`, treating only the first `assessed_steps` catalog steps as
/// executed. Categories beyond that, and categories whose step could not run
/// every probe, are reported with `score: None` rather than a clean 100.
pub fn score(findings: &[Finding], assessed_steps: usize) -> ScoreSummary {
    let mut overall = SeverityCounts::default();
    let mut per_category: HashMap<CheckCategory, SeverityCounts> = HashMap::new();
    let mut gaps: HashSet<CheckCategory> = HashSet::new();

    for finding in findings {
        overall.add(finding.severity);
        per_category.entry(finding.category).or_default().add(finding.severity);
        if knowledge_base::marks_incomplete(&finding.code) {
            gaps.insert(finding.category);
        }
    }

    let assessed: Vec<CheckCategory> = catalog::assessed_categories(assessed_steps).collect();
    let category_scores = catalog::steps()
        .iter()
        .map(|step| {
            let counts = per_category.get(&step.category).copied().unwrap_or_default();
            let incomplete = gaps.contains(&step.category);
            let score = (assessed.contains(&step.category) && !incomplete).then(|| score_counts(&counts));
            CategoryScore { category: step.category, score, incomplete, counts }
        })
        .collect();

    let overall_score = score_counts(&overall);
    ScoreSummary {
        total_findings: overall.total(),
        counts_by_severity: overall,
        category_scores,
        overall_score,
        rating: rating(overall_score).to_string(),
    }
}

pub fn rating(score: u8) -> &'static str {
    match score {
        90..=100 => "Excellent",
        75..=89 => "Good",
        50..=74 => "Needs Improvement",
        _ => "Poor",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn score_complete(findings: &[Finding]) -> ScoreSummary {
        score(findings, catalog::step_count())
    }

    fn finding(category: CheckCategory, severity: Severity) -> Finding {
        coded(category, severity, "TEST")
    }

    fn coded(category: CheckCategory, severity: Severity, code: &str) -> Finding {
        Finding {
            id: crate::core::models::new_id(),
            scan_id: "scan".into(),
            category,
            severity,
            code: code.into(),
            title: "Test".into(),
            description: String::new(),
            affected_url: None,
            recommendation: String::new(),
            created_at: Utc::now(),
        }
    }

    fn counts(c: usize, h: usize, m: usize, l: usize) -> SeverityCounts {
        SeverityCounts { critical: c, high: h, medium: m, low: l, info: 0 }
    }

    #[test]
    fn empty_set_scores_perfect() {
        let summary = score_complete(&[]);
        assert_eq!(summary.overall_score, 100);
        assert_eq!(summary.total_findings, 0);
        assert_eq!(summary.rating, "Excellent");
        assert!(summary.category_scores.iter().all(|c| c.score == Some(100)));
    }

    #[test]
    fn one_critical_two_high_scores_sixty() {
        let findings = vec![
            finding(CheckCategory::Transport, Severity::Critical),
            finding(CheckCategory::Headers, Severity::High),
            finding(CheckCategory::Forms, Severity::High),
        ];
        let summary = score_complete(&findings);
        assert_eq!(summary.overall_score, 60);
        assert_eq!(summary.counts_by_severity.critical, 1);
        assert_eq!(summary.counts_by_severity.high, 2);
    }

    #[test]
    fn formula_is_clamped_and_monotonic() {
        for c in 0..6 {
            for h in 0..6 {
                for m in 0..6 {
                    for l in 0..6 {
                        let s = score_counts(&counts(c, h, m, l)) as i64;
                        let expected = (100 - 20 * c as i64 - 10 * h as i64 - 5 * m as i64 - 2 * l as i64).clamp(0, 100);
                        assert_eq!(s, expected);
                        assert!(s >= score_counts(&counts(c + 1, h, m, l)) as i64);
                        assert!(s >= score_counts(&counts(c, h + 1, m, l)) as i64);
                        assert!(s >= score_counts(&counts(c, h, m + 1, l)) as i64);
                        assert!(s >= score_counts(&counts(c, h, m, l + 1)) as i64);
                    }
                }
            }
        }
    }

    #[test]
    fn info_findings_never_change_scores() {
        let base = vec![finding(CheckCategory::Dns, Severity::Medium)];
        let mut with_info = base.clone();
        with_info.push(finding(CheckCategory::Dns, Severity::Info));
        with_info.push(finding(CheckCategory::Cookies, Severity::Info));

        let a = score_complete(&base);
        let b = score_complete(&with_info);
        assert_eq!(a.overall_score, b.overall_score);
        assert_eq!(b.total_findings, 3);
        assert_eq!(b.counts_by_severity.info, 2);
        for (x, y) in a.category_scores.iter().zip(&b.category_scores) {
            assert_eq!(x.score, y.score);
        }
    }

    #[test]
    fn category_scores_only_count_their_own_findings() {
        let findings = vec![
            finding(CheckCategory::Headers, Severity::Medium),
            finding(CheckCategory::Headers, Severity::Low),
            finding(CheckCategory::Transport, Severity::Critical),
        ];
        let summary = score_complete(&findings);
        let by = |cat| summary.category_scores.iter().find(|c| c.category == cat).unwrap().score;
        assert_eq!(by(CheckCategory::Headers), Some(93));
        assert_eq!(by(CheckCategory::Transport), Some(80));
        assert_eq!(by(CheckCategory::Cookies), Some(100));
    }

    #[test]
    fn unreached_categories_are_not_assessed() {
        let findings = vec![finding(CheckCategory::Transport, Severity::High)];
        let summary = score(&findings, 2);
        let assessed: Vec<_> = summary.category_scores.iter().filter(|c| c.is_assessed()).map(|c| c.category).collect();
        assert_eq!(assessed, vec![CheckCategory::Transport, CheckCategory::Headers]);
        assert_eq!(summary.category_scores[2].score, None);
        assert_eq!(summary.overall_score, 90);
    }

    #[test]
    fn scores_never_go_negative() {
        let findings: Vec<_> = (0..12).map(|_| finding(CheckCategory::Disclosure, Severity::Critical)).collect();
        let summary = score_complete(&findings);
        assert_eq!(summary.overall_score, 0);
        assert_eq!(summary.rating, "Poor");
    }

    #[test]
    fn overrun_step_is_incomplete_not_perfect() {
        let findings = vec![
            coded(CheckCategory::Disclosure, Severity::Critical, "DISCLOSURE_GIT_EXPOSED"),
            coded(CheckCategory::Disclosure, Severity::Info, "STEP_BUDGET_EXCEEDED"),
            coded(CheckCategory::Dns, Severity::Info, "PROBE_TIMEOUT"),
        ];
        let summary = score_complete(&findings);
        let category = |cat| summary.category_scores.iter().find(|c| c.category == cat).unwrap();

        let disclosure = category(CheckCategory::Disclosure);
        assert!(disclosure.incomplete);
        assert_eq!(disclosure.score, None);
        assert_eq!(disclosure.counts.critical, 1);
        assert_eq!(category(CheckCategory::Dns).score, None);
        assert_eq!(category(CheckCategory::Cookies).score, Some(100));
        assert!(!category(CheckCategory::Cookies).incomplete);
        // What was found still weighs on the overall score.
        assert_eq!(summary.overall_score, 80);
    }
}
