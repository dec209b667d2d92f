//! Root task: drives the C10 pipeline over a submission's content and
//! stores `sentences`/`topics` (C15, grounded in
//! `lib/tasks/split_topic_generation.py` and `lib/tasks/text_splitting.py`
//! — re-expressed against [`Pipeline`] rather than the legacy word-marker
//! splitter those files build on; see DESIGN.md).

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use sqlx::SqlitePool;

use crate::store::models::topics_from_groups;
use crate::store::submissions::SubmissionStore;
use crate::tasks::SharedLlm;
use crate::txt_splitt::chunkers::SizeBasedChunker;
use crate::txt_splitt::enhancers::ShortSentenceEnhancer;
use crate::txt_splitt::gap_handlers::LlmRepairingGapHandler;
use crate::txt_splitt::html::HtmlTagStripCleaner;
use crate::txt_splitt::markers::BracketMarker;
use crate::txt_splitt::normalizers::NormalizingSplitter;
use crate::txt_splitt::offset_restorers::MappingOffsetRestorer;
use crate::txt_splitt::parsers::TopicRangeParser;
use crate::txt_splitt::pipeline::Pipeline;
use crate::txt_splitt::protocols::LlmCallable;
use crate::txt_splitt::splitters::HtmlAwareSentenceSplitter;
use crate::txt_splitt::tracer::Tracer;

use crate::llm::TopicRangeLlm;

const TOPIC_RANGE_TEMPERATURE: f32 = 0.2;
const GAP_REPAIR_TEMPERATURE: f32 = 0.1;
const ENHANCER_TEMPERATURE: f32 = 0.1;
const MIN_ENHANCER_LENGTH: usize = 40;

pub async fn process(pool: &SqlitePool, llm: Arc<dyn LlmCallable>, submission_id: &str) -> anyhow::Result<()> {
    let submission = SubmissionStore::get_by_id(pool, submission_id)
        .await?
        .ok_or_else(|| anyhow!("submission {submission_id} not found"))?;

    let (source_text, offset_mapping) = if !submission.html_content.trim().is_empty() {
        let (clean, mapping) = HtmlTagStripCleaner.clean(&submission.html_content);
        (clean, Some(mapping))
    } else {
        (submission.text_content.clone(), None)
    };

    let splitter = Box::new(NormalizingSplitter::with_defaults(Box::new(HtmlAwareSentenceSplitter::default())));
    let topic_llm = Box::new(TopicRangeLlm::new(
        Box::new(SharedLlm(Arc::clone(&llm))),
        TOPIC_RANGE_TEMPERATURE,
        Some(Box::new(SizeBasedChunker::default())),
    ));
    let gap_handler = Box::new(LlmRepairingGapHandler::new(Box::new(SharedLlm(Arc::clone(&llm))), GAP_REPAIR_TEMPERATURE));

    let pipeline = Pipeline::builder(splitter, Box::new(BracketMarker), topic_llm, Box::new(TopicRangeParser), gap_handler)
        .with_enhancer(Box::new(ShortSentenceEnhancer::new(
            Box::new(SharedLlm(Arc::clone(&llm))),
            MIN_ENHANCER_LENGTH,
            ENHANCER_TEMPERATURE,
        )))
        .build();

    let tracer = Tracer::new();
    let result = tokio::task::block_in_place(|| pipeline.run(&source_text, Some(&tracer))).context("split_topic_generation pipeline failed")?;

    let result = match offset_mapping {
        Some(mapping) => MappingOffsetRestorer.restore(result, &mapping),
        None => result,
    };

    let topics = topics_from_groups(&result.groups);

    let mut partial = HashMap::new();
    partial.insert("sentences".to_string(), serde_json::to_value(&result.sentences)?);
    partial.insert("topics".to_string(), serde_json::to_value(&topics)?);
    SubmissionStore::update_results(pool, submission_id, partial).await?;

    Ok(())
}
