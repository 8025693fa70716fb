// src/runner.rs

use crate::config::QueryGroup;
use crate::db::StateStore;
use crate::domain::listing::days_between;
use crate::domain::{diff_snapshot, format_price, sweep_removed, Change, Removal};
use crate::errors::StoreError;
use crate::notifier::{Channel, Notifier};
use crate::scraper::{build_snapshot, PageSource, Query};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct RunSettings {
    pub max_pages: usize,
    pub staleness_secs: i64,
}

/// Tally of one invocation, logged at the end of the run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub queries_ok: usize,
    pub queries_failed: usize,
    pub truncated_queries: usize,
    pub skipped_records: usize,
    pub new: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub notify_failures: usize,
}

/// Drives snapshot → diff → notify for every query, then the removal sweep.
pub struct Runner<'a> {
    store: &'a mut dyn StateStore,
    source: &'a dyn PageSource,
    notifier: &'a dyn Notifier,
    settings: RunSettings,
}

impl<'a> Runner<'a> {
    pub fn new(
        store: &'a mut dyn StateStore,
        source: &'a dyn PageSource,
        notifier: &'a dyn Notifier,
        settings: RunSettings,
    ) -> Self {
        Self {
            store,
            source,
            notifier,
            settings,
        }
    }

    /// Processes `groups` in order, then sweeps stale listings once.
    ///
    /// A query whose snapshot cannot be built is logged and skipped; the rest
    /// of the run continues. Only store failures abort the run.
    pub fn run(
        &mut self,
        groups: &[QueryGroup],
        removed_channel: &Channel,
        now: i64,
    ) -> Result<RunReport, StoreError> {
        let mut report = RunReport::default();

        for group in groups {
            info!(group = %group.name, queries = group.queries.len(), "processing query group");
            for query in &group.queries {
                self.run_query(group, query, now, &mut report)?;
            }
        }

        self.sweep(groups, removed_channel, now, &mut report)?;

        info!(
            queries_ok = report.queries_ok,
            queries_failed = report.queries_failed,
            truncated = report.truncated_queries,
            skipped_records = report.skipped_records,
            new = report.new,
            updated = report.updated,
            unchanged = report.unchanged,
            removed = report.removed,
            notify_failures = report.notify_failures,
            "run finished"
        );
        Ok(report)
    }

    fn run_query(
        &mut self,
        group: &QueryGroup,
        query: &Query,
        now: i64,
        report: &mut RunReport,
    ) -> Result<(), StoreError> {
        let mut snapshot = match build_snapshot(self.source, query, self.settings.max_pages, now) {
            Ok(s) => s,
            Err(e) => {
                error!(group = %group.name, query = %query.url, error = %e, "source unavailable, skipping query");
                report.queries_failed += 1;
                return Ok(());
            }
        };

        report.queries_ok += 1;
        report.skipped_records += snapshot.skipped;
        if snapshot.truncated {
            report.truncated_queries += 1;
        }

        for listing in &mut snapshot.listings {
            listing.group = Some(group.name.clone());
        }
        let changes = diff_snapshot(&mut *self.store, &snapshot.listings, now)?;

        for change in &changes {
            match change {
                Change::New(listing) => {
                    report.new += 1;
                    info!(group = %group.name, id = %listing.id, "new listing");
                    self.send(
                        &group.new_channel,
                        &listing.name,
                        &listing.to_display_text(now),
                        report,
                    );
                }
                Change::Updated { listing, old_price } => {
                    report.updated += 1;
                    info!(group = %group.name, id = %listing.id, old_price, new_price = listing.price, "price changed");
                    let body = format!(
                        "From {} to {}. {}",
                        format_price(*old_price),
                        format_price(listing.price),
                        listing.link
                    );
                    self.send(&group.update_channel, "Price update", &body, report);
                }
                Change::Unchanged(_) => report.unchanged += 1,
            }
        }
        Ok(())
    }

    /// Removed notices go to the claiming group's channel when it has one,
    /// otherwise to `default_channel`.
    fn sweep(
        &mut self,
        groups: &[QueryGroup],
        default_channel: &Channel,
        now: i64,
        report: &mut RunReport,
    ) -> Result<(), StoreError> {
        let removals = sweep_removed(&mut *self.store, now, self.settings.staleness_secs)?;

        for removal in &removals {
            report.removed += 1;
            info!(id = %removal.id, last_seen = removal.last_seen, "listing presumed sold or removed");
            let channel = removal
                .group
                .as_deref()
                .and_then(|name| groups.iter().find(|g| g.name == name))
                .and_then(|g| g.removed_channel.as_ref())
                .unwrap_or(default_channel);
            let (subject, body) = removed_message(removal, now);
            self.send(channel, &subject, &body, report);
        }
        Ok(())
    }

    // Delivery is best effort; the store already reflects what was observed.
    fn send(&self, channel: &Channel, subject: &str, body: &str, report: &mut RunReport) {
        if let Err(e) = self.notifier.notify(channel, subject, body) {
            warn!(channel = %channel.name, subject = subject, error = %e, "notification not delivered");
            report.notify_failures += 1;
        }
    }
}

fn removed_message(removal: &Removal, now: i64) -> (String, String) {
    let days = removal
        .first_seen
        .map(|first| days_between(first, now).to_string())
        .unwrap_or_else(|| "?".to_string());
    let subject = format!("Listing was sold or removed, first seen {days} days ago");
    let body = match &removal.listing {
        Some(listing) => listing.to_display_text(now),
        None => removal.record.clone(),
    };
    (subject, body)
}
