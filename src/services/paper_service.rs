use crate::error::GenerationError;
use crate::models::paper::{ComposedPaper, PaperMeta};
use crate::models::question::{CandidateQuestion, NewBankQuestion, Provenance};
use crate::models::quota::{Quota, RequestedType};
use crate::services::ai_service::{build_prompt, ProviderChain};
use crate::services::bank_service::{BankScope, FallbackSourcer, QuestionBank, ScopeFilter};
use crate::services::composer::compose;
use crate::services::draft_parser;
use crate::services::paper_store::{ArtifactPaths, PaperStore};
use crate::services::reconcile_service::reconcile;
use crate::utils::text::{text_hash, truncate_text};
use crate::utils::token::generate_paper_id;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

/// One paper request after the HTTP payload has been validated.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub meta: PaperMeta,
    pub requested: Vec<RequestedType>,
    pub difficulty: Vec<(String, f64)>,
    pub topic: Option<String>,
    pub chapters: Vec<String>,
    pub visitor_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedPaper {
    pub paper: ComposedPaper,
    pub artifacts: ArtifactPaths,
}

#[derive(Clone)]
pub struct PaperService {
    chain: ProviderChain,
    bank: Arc<dyn QuestionBank>,
    store: Arc<dyn PaperStore>,
    sourcer: FallbackSourcer,
    text_fallback: bool,
    public_base_url: String,
}

impl PaperService {
    pub fn new(
        chain: ProviderChain,
        bank: Arc<dyn QuestionBank>,
        store: Arc<dyn PaperStore>,
        synthetic_marks: i32,
        text_fallback: bool,
        public_base_url: String,
    ) -> Self {
        Self {
            sourcer: FallbackSourcer::new(bank.clone(), synthetic_marks),
            chain,
            bank,
            store,
            text_fallback,
            public_base_url,
        }
    }

    /// Runs one request from quota to persisted paper.
    ///
    /// Generative failures of any kind degrade to an empty draft. The only
    /// errors returned are a rejected quota, a paper that could not be
    /// filled to the requested total, and a failed write.
    pub async fn generate(&self, request: GenerateRequest) -> Result<GeneratedPaper, GenerationError> {
        let quota = Quota::build(request.requested.clone(), request.difficulty.clone())?;
        tracing::info!(
            subject = %request.meta.subject,
            class = %request.meta.class_name,
            total = quota.total_required(),
            nominal_marks = quota.total_marks(),
            "Generating paper"
        );

        let draft = self.draft(&request, &quota).await;
        let reconciled = reconcile(&draft, &quota);
        tracing::info!(
            drafted = draft.len(),
            selected = reconciled.selected.len(),
            short = reconciled.total_shortfall(),
            "Draft reconciled"
        );

        let chapter_ids = self.resolve_chapters(&request).await;
        let scope = BankScope {
            language: request.meta.language.clone(),
            filter: ScopeFilter::select(
                &chapter_ids,
                request.topic.as_deref(),
                &request.meta.board,
                &request.meta.class_name,
                &request.meta.subject,
            ),
        };

        let mut used = reconciled.used_texts;
        let selected = self
            .sourcer
            .backfill(
                &quota,
                reconciled.selected,
                &reconciled.shortfall,
                &scope,
                &request.meta.subject,
                &request.meta.class_name,
                &mut used,
            )
            .await;

        let expected = quota.total_required();
        if selected.len() != expected {
            return Err(GenerationError::IncompletePaper {
                expected,
                actual: selected.len(),
            });
        }

        let mut paper = compose(generate_paper_id(), request.meta.clone(), Utc::now(), selected);
        self.bank_generated(&mut paper, chapter_ids.first().copied()).await?;

        let artifacts = self.artifacts(&paper.paper_id);
        self.store
            .save_paper(&paper, &artifacts, request.visitor_id.as_deref())
            .await
            .map_err(|e| GenerationError::PersistenceFailure(e.to_string()))?;

        tracing::info!(
            paper_id = %paper.paper_id,
            questions = paper.total_questions,
            marks = paper.total_marks,
            "Paper stored"
        );
        Ok(GeneratedPaper { paper, artifacts })
    }

    async fn draft(&self, request: &GenerateRequest, quota: &Quota) -> Vec<CandidateQuestion> {
        if quota.total_required() == 0 {
            return Vec::new();
        }

        let prompt = build_prompt(&request.meta, quota, request.topic.as_deref(), &request.chapters);
        let raw = match self.chain.generate(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "No generative draft, falling back to the question bank");
                return Vec::new();
            }
        };

        match draft_parser::parse_with_text_fallback(&raw, self.text_fallback) {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(error = %e, raw = %truncate_text(&raw, 200), "Discarding draft");
                Vec::new()
            }
        }
    }

    async fn resolve_chapters(&self, request: &GenerateRequest) -> Vec<i32> {
        if request.chapters.is_empty() {
            return Vec::new();
        }
        match self
            .bank
            .resolve_chapter_ids(
                &request.meta.board,
                &request.meta.class_name,
                &request.meta.subject,
                &request.chapters,
            )
            .await
        {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(error = ?e, "Chapter lookup failed, widening scope");
                Vec::new()
            }
        }
    }

    /// Saves generated questions into the bank under `chapter_id` and
    /// records the bank ids on the paper. Without a chapter nothing is saved.
    async fn bank_generated(
        &self,
        paper: &mut ComposedPaper,
        chapter_id: Option<i32>,
    ) -> Result<(), GenerationError> {
        let Some(chapter_id) = chapter_id else {
            return Ok(());
        };

        let positions: Vec<usize> = paper
            .questions
            .iter()
            .enumerate()
            .filter(|(_, q)| q.provenance == Provenance::Generated)
            .map(|(idx, _)| idx)
            .collect();
        if positions.is_empty() {
            return Ok(());
        }

        let rows: Vec<NewBankQuestion> = positions
            .iter()
            .map(|&idx| {
                let q = &paper.questions[idx];
                NewBankQuestion {
                    chapter_id,
                    question_type: q.kind.as_str().to_string(),
                    difficulty: q.difficulty.clone(),
                    marks: q.marks,
                    question_text: q.text.clone(),
                    options: serde_json::json!(q.options),
                    answer: q.answer.clone(),
                    source: q.provenance.as_source().to_string(),
                    explanation: q.explanation.clone(),
                    language: paper.meta.language.clone(),
                    text_hash: text_hash(&q.text),
                }
            })
            .collect();

        let ids = self
            .store
            .save_questions(&rows)
            .await
            .map_err(|e| GenerationError::PersistenceFailure(e.to_string()))?;

        for (idx, id) in positions.into_iter().zip(ids) {
            let question = &mut paper.questions[idx];
            question.id = Some(id);
            question.chapter_id = Some(chapter_id);
        }
        Ok(())
    }

    pub async fn load(&self, paper_id: &str) -> crate::error::Result<ComposedPaper> {
        self.store.load_paper(paper_id).await
    }

    pub fn artifacts(&self, paper_id: &str) -> ArtifactPaths {
        ArtifactPaths::for_paper(&self.public_base_url, paper_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::models::question::BankQuestion;
    use crate::models::question_type::normalize;
    use crate::services::ai_service::{GenerativeProvider, MockGenerativeProvider};
    use crate::services::bank_service::tests::{row, MemoryBank};
    use crate::services::bank_service::BankQuery;
    use crate::services::paper_store::tests::MemoryStore;
    use async_trait::async_trait;

    struct Fixed(&'static str);

    #[async_trait]
    impl GenerativeProvider for Fixed {
        fn name(&self) -> String {
            "fixed".into()
        }

        async fn generate(&self, _prompt: &str) -> std::result::Result<String, GenerationError> {
            Ok(self.0.to_string())
        }
    }

    fn failing() -> MockGenerativeProvider {
        let mut provider = MockGenerativeProvider::new();
        provider.expect_name().return_const("down".to_string());
        provider.expect_generate().returning(|_| {
            Err(GenerationError::GenerativeUnavailable {
                provider: "down".into(),
                reason: "429 quota exceeded".into(),
            })
        });
        provider
    }

    /// A bank that also resolves chapter names to ids.
    struct ChapterBank {
        inner: MemoryBank,
        chapters: Vec<i32>,
    }

    #[async_trait]
    impl QuestionBank for ChapterBank {
        async fn find_candidates(&self, query: &BankQuery) -> Result<Vec<BankQuestion>> {
            self.inner.find_candidates(query).await
        }

        async fn resolve_chapter_ids(
            &self,
            _board: &str,
            _class_name: &str,
            _subject: &str,
            _names: &[String],
        ) -> Result<Vec<i32>> {
            Ok(self.chapters.clone())
        }
    }

    fn request(items: &[(&str, i64, i64)]) -> GenerateRequest {
        GenerateRequest {
            meta: PaperMeta {
                exam_name: "Term 1".into(),
                school_name: "Green Valley School".into(),
                board: "CBSE".into(),
                class_name: "8".into(),
                subject: "Science".into(),
                language: "english".into(),
            },
            requested: items
                .iter()
                .map(|(label, count, marks)| RequestedType {
                    label: label.to_string(),
                    count: *count,
                    marks: *marks,
                })
                .collect(),
            difficulty: vec![("Medium".into(), 100.0)],
            topic: None,
            chapters: vec![],
            visitor_id: Some("visitor-1".into()),
        }
    }

    fn service(
        providers: Vec<Arc<dyn GenerativeProvider>>,
        bank: Arc<dyn QuestionBank>,
        store: Arc<MemoryStore>,
    ) -> PaperService {
        PaperService::new(
            ProviderChain::new(providers),
            bank,
            store,
            3,
            false,
            "http://localhost:8000".into(),
        )
    }

    const DRAFT_WITH_DUPLICATE: &str = r#"```json
[
  {"type": "MCQ", "question": "Which gas do plants absorb?", "options": ["O2", "CO2", "N2", "H2"], "marks": 1, "difficulty": "Easy", "answer": "CO2"},
  {"type": "MCQ", "question": "which gas do  plants absorb?", "options": ["O2", "CO2", "N2", "H2"], "marks": 1, "difficulty": "Easy"},
  {"type": "Short Answer", "question": "Explain transpiration.", "marks": 3, "difficulty": "Medium"}
]
```"#;

    #[tokio::test]
    async fn duplicate_draft_item_is_replaced_from_the_bank() {
        let bank = Arc::new(MemoryBank {
            rows: vec![row(7, "MCQ", "What is the unit of force?", 1)],
            ..Default::default()
        });
        let store = Arc::new(MemoryStore::default());
        let svc = service(vec![Arc::new(Fixed(DRAFT_WITH_DUPLICATE))], bank.clone(), store.clone());

        let out = svc
            .generate(request(&[("MCQ", 2, 1), ("Short Answer", 1, 3)]))
            .await
            .unwrap();
        let paper = out.paper;

        assert_eq!(paper.total_questions, 3);
        assert_eq!(paper.total_marks, 5);
        let mcqs: Vec<_> = paper.questions.iter().filter(|q| q.kind.is_mcq()).collect();
        assert_eq!(mcqs.len(), 2);
        assert_eq!(mcqs[1].provenance, Provenance::BankSourced);
        assert_eq!(mcqs[1].id, Some(7));
        assert_eq!(bank.queries.lock().unwrap().len(), 1);

        let numbers: Vec<_> = paper.questions.iter().map(|q| q.number.unwrap()).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(store.papers.lock().unwrap().contains_key(&paper.paper_id));
        assert!(out.artifacts.pdf.ends_with("/pdf"));
    }

    #[tokio::test]
    async fn provider_outage_still_yields_the_requested_total() {
        let bank = Arc::new(MemoryBank {
            rows: vec![
                row(1, "MCQ", "Bank MCQ one", 1),
                row(2, "Long Answer", "Bank long one", 5),
            ],
            ..Default::default()
        });
        let store = Arc::new(MemoryStore::default());
        let svc = service(vec![Arc::new(failing()), Arc::new(failing())], bank, store);

        let paper = svc
            .generate(request(&[("MCQ", 2, 1), ("Long", 2, 5)]))
            .await
            .unwrap()
            .paper;

        assert_eq!(paper.total_questions, 4);
        let synthesized = paper
            .questions
            .iter()
            .filter(|q| q.provenance == Provenance::Synthesized)
            .count();
        assert_eq!(synthesized, 2);
        assert!(paper.questions.iter().all(|q| q.provenance != Provenance::Generated));
    }

    #[tokio::test]
    async fn unrecognized_type_is_filled_by_placeholders() {
        let bank = Arc::new(MemoryBank::default());
        let store = Arc::new(MemoryStore::default());
        let draft = r#"[{"type": "Essay", "question": "Write about the monsoon.", "marks": 5}]"#;
        let svc = service(vec![Arc::new(Fixed(draft))], bank.clone(), store);

        let paper = svc.generate(request(&[("Essay", 2, 5)])).await.unwrap().paper;
        assert_eq!(paper.total_questions, 2);
        assert!(paper
            .questions
            .iter()
            .all(|q| q.provenance == Provenance::Synthesized));
        assert!(bank.queries.lock().unwrap().is_empty());
        assert!(paper.questions.iter().all(|q| q.kind != normalize("Essay")));
    }

    #[tokio::test]
    async fn total_matches_quota_across_scenarios() {
        let quotas: [&[(&str, i64, i64)]; 4] = [
            &[("MCQ", 3, 1)],
            &[("MCQ", 1, 1), ("Fill", 2, 1), ("Case Study", 1, 4)],
            &[("Matching", 0, 2), ("Short", 2, 3)],
            &[("Multiple Choice", 1, 1), ("MCQ", 2, 1)],
        ];
        let drafts = ["[]", DRAFT_WITH_DUPLICATE, "not json at all"];

        for quota in quotas {
            for draft in drafts {
                for bank_rows in [vec![], vec![row(1, "MCQ", "Bank MCQ", 1)]] {
                    let bank = Arc::new(MemoryBank {
                        rows: bank_rows,
                        ..Default::default()
                    });
                    let svc = service(
                        vec![Arc::new(Fixed(draft))],
                        bank,
                        Arc::new(MemoryStore::default()),
                    );
                    let expected: i64 = quota.iter().map(|(_, count, _)| count).sum();
                    let paper = svc.generate(request(quota)).await.unwrap().paper;
                    assert_eq!(paper.total_questions as i64, expected, "{quota:?} / {draft}");
                    assert_eq!(paper.questions.len() as i64, expected);
                }
            }
        }
    }

    #[tokio::test]
    async fn invalid_quota_is_rejected_before_any_work() {
        let mut never = MockGenerativeProvider::new();
        never.expect_name().return_const("never".to_string());
        never.expect_generate().never();
        let svc = service(
            vec![Arc::new(never)],
            Arc::new(MemoryBank::default()),
            Arc::new(MemoryStore::default()),
        );

        let err = svc.generate(request(&[("MCQ", -1, 1)])).await.unwrap_err();
        assert!(matches!(err, GenerationError::InvalidQuota(_)));
    }

    #[tokio::test]
    async fn failed_paper_write_is_a_persistence_failure() {
        let store = Arc::new(MemoryStore {
            fail_papers: true,
            ..Default::default()
        });
        let svc = service(vec![], Arc::new(MemoryBank::default()), store);
        let err = svc.generate(request(&[("MCQ", 1, 1)])).await.unwrap_err();
        assert!(matches!(err, GenerationError::PersistenceFailure(_)));
    }

    #[tokio::test]
    async fn generated_questions_are_banked_when_a_chapter_resolves() {
        let bank = Arc::new(ChapterBank {
            inner: MemoryBank::default(),
            chapters: vec![42],
        });
        let store = Arc::new(MemoryStore::default());
        let svc = service(vec![Arc::new(Fixed(DRAFT_WITH_DUPLICATE))], bank, store.clone());

        let mut req = request(&[("MCQ", 1, 1), ("Short Answer", 1, 3)]);
        req.chapters = vec!["Crop Production".into()];
        let paper = svc.generate(req).await.unwrap().paper;

        let banked = store.banked.lock().unwrap();
        assert_eq!(banked.len(), 2);
        assert!(banked.iter().all(|b| b.chapter_id == 42 && b.source == "ai"));
        assert!(paper.questions.iter().all(|q| q.id.is_some()));
    }

    #[tokio::test]
    async fn nothing_is_banked_without_a_chapter() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(
            vec![Arc::new(Fixed(DRAFT_WITH_DUPLICATE))],
            Arc::new(MemoryBank::default()),
            store.clone(),
        );
        svc.generate(request(&[("Short", 1, 3)])).await.unwrap();
        assert!(store.banked.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn free_text_difficulty_still_persists() {
        const VERBOSE: &str = r#"[
            {"type": "MCQ", "question": "Which metal is liquid at room temperature?", "options": {"A": "Mercury", "B": "Iron", "C": "Zinc", "D": "Tin"}, "difficulty": "Medium (application level)"},
            {"type": "Short Answer", "question": "Why do metals conduct heat?", "difficulty": "Hard - requires higher order reasoning"}
        ]"#;
        let bank = Arc::new(ChapterBank {
            inner: MemoryBank::default(),
            chapters: vec![7],
        });
        let store = Arc::new(MemoryStore::default());
        let svc = service(vec![Arc::new(Fixed(VERBOSE))], bank, store.clone());

        let mut req = request(&[("MCQ", 1, 1), ("Short Answer", 1, 3)]);
        req.chapters = vec!["Metals".into()];
        let paper = svc.generate(req).await.unwrap().paper;

        let levels: Vec<_> = paper.questions.iter().map(|q| q.difficulty.as_str()).collect();
        assert_eq!(levels, vec!["Medium", "Hard"]);
        assert_eq!(paper.questions[0].options[0], "Mercury");
        assert!(paper.questions.iter().all(|q| q.provenance == Provenance::Generated));
        assert_eq!(store.banked.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn oversized_quota_is_rejected_before_any_work() {
        let mut never = MockGenerativeProvider::new();
        never.expect_name().return_const("never".to_string());
        never.expect_generate().never();
        let bank = Arc::new(MemoryBank::default());
        let svc = service(vec![Arc::new(never)], bank.clone(), Arc::new(MemoryStore::default()));

        let err = svc.generate(request(&[("MCQ", 1 << 40, 1)])).await.unwrap_err();
        assert!(matches!(err, GenerationError::InvalidQuota(_)));
        assert!(bank.queries.lock().unwrap().is_empty());
    }
}
