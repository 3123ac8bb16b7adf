use std::{fmt, sync::Arc};

use anyhow::{bail, Context};
use indexmap::IndexMap;
use strum::Display;

use crate::{
    email::{Classifier, LabelPlan, LabelRegistry, Mailbox, PlanBuilder, PlanOutcome},
    model::LabelVocabulary,
    prompt::ClassifyAi,
    util::truncate_chars,
};

/// Body characters handed to the classifier.
pub const CLASSIFY_BODY_CHARS: usize = 1000;
/// Subject characters written to the log.
const LOG_SUBJECT_CHARS: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PassKind {
    #[strum(serialize = "new-mail")]
    NewMail,
    #[strum(serialize = "re-check")]
    Recheck,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub new_mail_query: String,
    pub recheck_query: String,
    pub max_results: u32,
    pub dry_run: bool,
}

/// Counters of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub candidates: usize,
    pub skipped: usize,
    pub classified: usize,
    pub unchanged: usize,
    pub failed: usize,
    /// Messages per label the plan adds.
    pub added: IndexMap<String, usize>,
    pub catch_all_removed: usize,
}

impl PassSummary {
    fn record_plan(&mut self, plan: &LabelPlan) {
        self.added = plan
            .additions()
            .iter()
            .map(|(label, ids)| (label.clone(), ids.len()))
            .collect();
        self.catch_all_removed = plan.catch_all_removals().len();
    }
}

impl fmt::Display for PassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let added = self
            .added
            .iter()
            .map(|(label, n)| format!("{label}={n}"))
            .collect::<Vec<_>>()
            .join(", ");
        write!(
            f,
            "candidates={} skipped={} classified={} unchanged={} failed={} added=[{}] catch_all_removed={}",
            self.candidates,
            self.skipped,
            self.classified,
            self.unchanged,
            self.failed,
            added,
            self.catch_all_removed
        )
    }
}

/// Runs the new-mail pass and the re-check pass against one mailbox.
///
/// Nothing survives between runs except what was written to the mailbox.
pub struct Orchestrator<M, A> {
    mailbox: M,
    classifier: Classifier<A>,
    vocabulary: Arc<LabelVocabulary>,
    options: RunOptions,
}

impl<M: Mailbox, A: ClassifyAi> Orchestrator<M, A> {
    pub fn new(mailbox: M, classifier: Classifier<A>, options: RunOptions) -> Self {
        let vocabulary = Arc::clone(classifier.vocabulary());
        Self {
            mailbox,
            classifier,
            vocabulary,
            options,
        }
    }

    pub fn mailbox(&self) -> &M {
        &self.mailbox
    }

    /// Both passes in order. A failed pass does not stop the other one, the
    /// run still reports the failure.
    pub async fn run_once(&self) -> anyhow::Result<Vec<PassSummary>> {
        tracing::info!(
            "Starting label run | dry_run={} | q={:.80} | max={}",
            self.options.dry_run,
            self.options.new_mail_query,
            self.options.max_results
        );

        let mut registry = self.load_registry().await?;
        let passes = [
            (PassKind::NewMail, self.options.new_mail_query.as_str()),
            (PassKind::Recheck, self.options.recheck_query.as_str()),
        ];

        let mut summaries = Vec::with_capacity(passes.len());
        let mut failed = Vec::new();
        for (kind, query) in passes {
            match self.run_pass(kind, query, &mut registry).await {
                Ok(summary) => {
                    tracing::info!("Pass {} done: {}", kind, summary);
                    summaries.push(summary);
                }
                Err(e) => {
                    tracing::error!("Pass {} failed: {:?}", kind, e);
                    failed.push(kind);
                }
            }
        }

        if !failed.is_empty() {
            bail!("Label run incomplete, failed passes: {:?}", failed);
        }
        Ok(summaries)
    }

    async fn load_registry(&self) -> anyhow::Result<LabelRegistry> {
        let registry = if self.options.dry_run {
            self.mailbox.list_labels().await
        } else {
            self.mailbox
                .ensure_labels(&self.vocabulary.managed_labels())
                .await
        };
        let registry = registry.context("Could not load mailbox labels")?;

        if registry.is_empty() {
            tracing::debug!("Mailbox has no user labels");
        } else {
            tracing::debug!("{} labels known to the mailbox", registry.len());
        }
        Ok(registry)
    }

    pub async fn run_pass(
        &self,
        kind: PassKind,
        query: &str,
        registry: &mut LabelRegistry,
    ) -> anyhow::Result<PassSummary> {
        let ids = self
            .mailbox
            .list_candidate_ids(query, self.options.max_results)
            .await
            .with_context(|| format!("Could not list messages for {query:?}"))?;
        tracing::info!("Pass {}: {} candidates (q={:.120})", kind, ids.len(), query);

        let mut summary = PassSummary {
            candidates: ids.len(),
            ..Default::default()
        };
        let mut builder = PlanBuilder::new(&self.vocabulary);

        for id in &ids {
            let message = match self.mailbox.fetch_message(id).await {
                Ok(message) => message,
                Err(e) => {
                    tracing::error!(
                        "Could not process {}, marking {}: {:?}",
                        id,
                        self.vocabulary.sentinel(),
                        e
                    );
                    builder.record_failure(id);
                    summary.failed += 1;
                    continue;
                }
            };

            let subject = truncate_chars(&message.subject, LOG_SUBJECT_CHARS);
            let current = registry.names_for(&message.label_ids);
            if builder.should_skip(&current) {
                tracing::info!(
                    "Skip (already labeled): {} | {} | present={}",
                    id,
                    subject,
                    current.join(", ")
                );
                summary.skipped += 1;
                continue;
            }

            let body = truncate_chars(&message.body, CLASSIFY_BODY_CHARS);
            let labels = self
                .classifier
                .classify(&message.sender, &message.subject, body)
                .await;

            match builder.add(id, &current, &labels) {
                PlanOutcome::Planned(labels) => {
                    tracing::info!("Classified: {} | {} -> {}", id, subject, labels.join(", "));
                    summary.classified += 1;
                }
                PlanOutcome::Unchanged => {
                    tracing::info!("Unchanged: {} | {} stays {}", id, subject, labels.join(", "));
                    summary.unchanged += 1;
                }
                PlanOutcome::Skipped => summary.skipped += 1,
            }
        }

        let plan = builder.finish();
        summary.record_plan(&plan);

        if self.options.dry_run {
            self.log_plan(kind, &plan);
        } else {
            self.apply_plan(&plan, registry)
                .await
                .with_context(|| format!("Could not apply {kind} plan"))?;
        }

        Ok(summary)
    }

    fn log_plan(&self, kind: PassKind, plan: &LabelPlan) {
        for (label, ids) in plan.additions() {
            tracing::info!(
                "[DRY-RUN] ({}) would add '{}' to {} messages",
                kind,
                label,
                ids.len()
            );
        }
        if !plan.catch_all_removals().is_empty() {
            tracing::info!(
                "[DRY-RUN] ({}) would remove '{}' from {} messages",
                kind,
                self.vocabulary.catch_all(),
                plan.catch_all_removals().len()
            );
        }
    }

    /// Create missing labels, add per label, then drop the catch-all.
    async fn apply_plan(&self, plan: &LabelPlan, registry: &mut LabelRegistry) -> anyhow::Result<()> {
        if plan.is_empty() {
            return Ok(());
        }

        let mut needed = plan.label_names().collect::<Vec<_>>();
        if !plan.catch_all_removals().is_empty() {
            needed.push(self.vocabulary.catch_all());
        }
        let missing = registry.missing(needed);
        if !missing.is_empty() {
            tracing::info!("Creating missing labels: {}", missing.join(", "));
            registry.extend(self.mailbox.ensure_labels(&missing).await?);
        }

        for (label, ids) in plan.additions() {
            let label_id = registry
                .id(label)
                .with_context(|| format!("Label {label} has no id in the mailbox"))?;
            self.mailbox
                .add_labels(ids, &[label_id.to_string()])
                .await
                .with_context(|| format!("Could not add label {label}"))?;
        }

        let removals = plan.catch_all_removals();
        if !removals.is_empty() {
            let catch_all = self.vocabulary.catch_all();
            let label_id = registry
                .id(catch_all)
                .with_context(|| format!("Label {catch_all} has no id in the mailbox"))?;
            self.mailbox
                .remove_labels(removals, &[label_id.to_string()])
                .await
                .with_context(|| format!("Could not remove label {catch_all}"))?;
        }

        tracing::info!("Applied plan to {} labels", plan.additions().len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::MailMessage,
        testing::common::{FakeMailbox, FixedAi},
    };

    const NEW_MAIL: &str = "in:inbox is:unread newer_than:2d";
    const RECHECK: &str = "in:inbox label:Sonstiges newer_than:7d";

    fn options(dry_run: bool) -> RunOptions {
        RunOptions {
            new_mail_query: NEW_MAIL.to_string(),
            recheck_query: RECHECK.to_string(),
            max_results: 20,
            dry_run,
        }
    }

    fn orchestrator(
        mailbox: FakeMailbox,
        answer: &[&str],
        dry_run: bool,
    ) -> Orchestrator<FakeMailbox, FixedAi> {
        let vocabulary = Arc::new(LabelVocabulary::default());
        Orchestrator::new(
            mailbox,
            Classifier::new(FixedAi::new(answer), vocabulary),
            options(dry_run),
        )
    }

    fn unread(id: &str, sender: &str, subject: &str, body: &str) -> MailMessage {
        MailMessage {
            id: id.to_string(),
            sender: sender.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            label_ids: vec!["INBOX".to_string(), "UNREAD".to_string()],
            received_at: None,
        }
    }

    fn invoice() -> MailMessage {
        unread(
            "m1",
            "rechnung@firma.de",
            "Ihre Rechnung 2025-09",
            "Betrag 129,00 EUR, Zahlungsziel 14 Tage",
        )
    }

    fn chat() -> MailMessage {
        unread("m2", "max@example.org", "Hallo", "Bis morgen beim Essen?")
    }

    #[tokio::test]
    async fn test_invoice_gets_keyword_label_when_ai_gives_up() {
        let orch = orchestrator(FakeMailbox::with_messages([invoice()]), &["Sonstiges"], false);

        let summaries = orch.run_once().await.unwrap();

        assert_eq!(orch.mailbox().label_names_of("m1"), ["Rechnung(en)"]);
        assert_eq!(summaries[0].classified, 1);
        assert_eq!(summaries[0].added["Rechnung(en)"], 1);
        assert_eq!(summaries[0].catch_all_removed, 0);
        // labeled specifically, so the re-check query does not see it
        assert_eq!(summaries[1].candidates, 0);
    }

    #[tokio::test]
    async fn test_garbage_answer_ends_as_catch_all_without_removal() {
        let orch = orchestrator(FakeMailbox::with_messages([chat()]), &[], false);

        let summaries = orch.run_once().await.unwrap();

        assert_eq!(orch.mailbox().label_names_of("m2"), ["Sonstiges"]);
        assert_eq!(summaries[0].catch_all_removed, 0);
        assert_eq!(orch.mailbox().removals(), 0);
        // re-check finds it and leaves it alone
        assert_eq!(summaries[1].candidates, 1);
        assert_eq!(summaries[1].unchanged, 1);
        assert!(summaries[1].added.is_empty());
    }

    #[tokio::test]
    async fn test_second_run_skips_labeled_message() {
        let orch = orchestrator(FakeMailbox::with_messages([invoice()]), &["Sonstiges"], false);

        orch.run_once().await.unwrap();
        let modifications = orch.mailbox().modifications();
        let summaries = orch.run_once().await.unwrap();

        assert_eq!(summaries[0].candidates, 1);
        assert_eq!(summaries[0].skipped, 1);
        assert_eq!(summaries[0].classified, 0);
        assert_eq!(orch.mailbox().modifications(), modifications);
        assert_eq!(orch.mailbox().label_names_of("m1"), ["Rechnung(en)"]);
    }

    #[tokio::test]
    async fn test_recheck_replaces_catch_all() {
        let mailbox = FakeMailbox::with_messages([chat()]);
        let orch = orchestrator(mailbox, &[], false);
        orch.run_once().await.unwrap();
        assert_eq!(orch.mailbox().label_names_of("m2"), ["Sonstiges"]);
        orch.mailbox().mark_read("m2");

        // a later run where the model knows better
        let orch = Orchestrator::new(
            orch.mailbox,
            Classifier::new(FixedAi::new(&["Privat"]), Arc::new(LabelVocabulary::default())),
            options(false),
        );
        let summaries = orch.run_once().await.unwrap();

        assert_eq!(summaries[0].candidates, 0);
        assert_eq!(summaries[1].classified, 1);
        assert_eq!(summaries[1].catch_all_removed, 1);
        assert_eq!(orch.mailbox().label_names_of("m2"), ["Privat"]);
    }

    #[tokio::test]
    async fn test_fetch_failure_marks_sentinel_and_continues() {
        let mailbox = FakeMailbox::with_messages([invoice(), chat()]);
        mailbox.fail_fetch("m1");
        let orch = orchestrator(mailbox, &["FYI"], false);

        let summaries = orch.run_once().await.unwrap();

        assert_eq!(summaries[0].failed, 1);
        assert_eq!(summaries[0].classified, 1);
        assert_eq!(orch.mailbox().label_names_of("m1"), ["ai/error"]);
        assert_eq!(orch.mailbox().label_names_of("m2"), ["FYI"]);
    }

    #[tokio::test]
    async fn test_dry_run_never_mutates() {
        let orch = orchestrator(FakeMailbox::with_messages([invoice(), chat()]), &["FYI"], true);

        let summaries = orch.run_once().await.unwrap();

        assert_eq!(summaries[0].added["FYI"], 2);
        assert_eq!(orch.mailbox().modifications(), 0);
        assert!(orch.mailbox().created_labels().is_empty());
        assert!(orch.mailbox().label_names_of("m1").is_empty());
    }

    #[tokio::test]
    async fn test_failed_apply_still_runs_recheck() {
        let mailbox = FakeMailbox::with_messages([chat()]);
        mailbox.fail_modify();
        let orch = orchestrator(mailbox, &["Sport"], false);

        assert!(orch.run_once().await.is_err());
        assert_eq!(orch.mailbox().queries(), [NEW_MAIL, RECHECK]);
    }

    #[tokio::test]
    async fn test_label_without_id_fails_the_pass() {
        let mailbox = FakeMailbox::with_messages([chat()]);
        mailbox.refuse_label("FYI");
        let orch = orchestrator(mailbox, &["FYI"], false);

        assert!(orch.run_once().await.is_err());
        assert!(orch.mailbox().label_names_of("m2").is_empty());
        assert_eq!(orch.mailbox().modifications(), 0);
        // re-check pass still ran
        assert_eq!(orch.mailbox().queries(), [NEW_MAIL, RECHECK]);
    }

    #[tokio::test]
    async fn test_live_run_creates_managed_labels() {
        let orch = orchestrator(FakeMailbox::default(), &["FYI"], false);

        let summaries = orch.run_once().await.unwrap();

        assert_eq!(summaries[0].candidates, 0);
        let created = orch.mailbox().created_labels();
        assert_eq!(created.len(), 20);
        assert_eq!(created.first().map(String::as_str), Some("Rechnung(en)"));
        assert_eq!(created.last().map(String::as_str), Some("ai/error"));
    }

    #[test]
    fn test_summary_display() {
        let mut summary = PassSummary {
            candidates: 3,
            skipped: 1,
            classified: 2,
            ..Default::default()
        };
        summary.added.insert("FYI".to_string(), 2);
        assert_eq!(
            summary.to_string(),
            "candidates=3 skipped=1 classified=2 unchanged=0 failed=0 added=[FYI=2] catch_all_removed=0"
        );
    }
}
