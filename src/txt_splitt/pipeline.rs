//! Pipeline orchestrator tying together all splitting stages (C1-C10).

use crate::error::Result;
use crate::txt_splitt::protocols::{Enhancer, GapHandler, LlmStrategy, MarkerStrategy, ResponseParser, SentenceSplitter};
use crate::txt_splitt::tracer::Tracer;
use crate::txt_splitt::types::SplitResult;

/// Orchestrates the full text-splitting pipeline: split, mark, query an LLM,
/// parse, repair gaps, and (optionally) enhance boundaries. Exceptions from
/// any stage propagate directly to the caller. Pass a [`Tracer`] to record a
/// span tree for the run; omit it for zero tracing overhead.
pub struct Pipeline {
    splitter: Box<dyn SentenceSplitter>,
    marker: Box<dyn MarkerStrategy>,
    llm: Box<dyn LlmStrategy>,
    parser: Box<dyn ResponseParser>,
    gap_handler: Box<dyn GapHandler>,
    enhancer: Option<Box<dyn Enhancer>>,
}

pub struct PipelineBuilder {
    splitter: Box<dyn SentenceSplitter>,
    marker: Box<dyn MarkerStrategy>,
    llm: Box<dyn LlmStrategy>,
    parser: Box<dyn ResponseParser>,
    gap_handler: Box<dyn GapHandler>,
    enhancer: Option<Box<dyn Enhancer>>,
}

impl Pipeline {
    pub fn builder(
        splitter: Box<dyn SentenceSplitter>,
        marker: Box<dyn MarkerStrategy>,
        llm: Box<dyn LlmStrategy>,
        parser: Box<dyn ResponseParser>,
        gap_handler: Box<dyn GapHandler>,
    ) -> PipelineBuilder {
        PipelineBuilder { splitter, marker, llm, parser, gap_handler, enhancer: None }
    }

    /// Run the full pipeline on input text, optionally recording spans into
    /// `tracer`.
    pub fn run(&self, text: &str, tracer: Option<&Tracer>) -> Result<SplitResult> {
        let _root = tracer.map(|t| {
            let span = t.span("pipeline.run");
            span.set("input_length", text.len());
            span
        });

        let sentences = {
            let span = tracer.map(|t| t.span("split"));
            let sentences = self.splitter.split(text);
            if let Some(s) = &span {
                s.set("sentence_count", sentences.len());
            }
            sentences
        };

        let marked = {
            let span = tracer.map(|t| t.span("mark"));
            let marked = self.marker.mark(text, &sentences);
            if let Some(s) = &span {
                s.set("tagged_text_length", marked.tagged_text.len());
            }
            marked
        };

        let response = {
            let span = tracer.map(|t| t.span("llm.query"));
            let response = self.llm.query(&marked)?;
            if let Some(s) = &span {
                s.set("response_length", response.len());
            }
            response
        };

        let groups = {
            let span = tracer.map(|t| t.span("parse"));
            let groups = self.parser.parse(&response, marked.sentence_count)?;
            if let Some(s) = &span {
                s.set("group_count", groups.len());
            }
            groups
        };

        let groups = {
            let span = tracer.map(|t| t.span("gap_handler"));
            let groups = self.gap_handler.handle(groups, marked.sentence_count, Some(&sentences))?;
            if let Some(s) = &span {
                s.set("group_count", groups.len());
            }
            groups
        };

        let groups = if let Some(enhancer) = &self.enhancer {
            let span = tracer.map(|t| t.span("enhance"));
            let groups = enhancer.enhance(groups, &sentences)?;
            if let Some(s) = &span {
                s.set("group_count", groups.len());
            }
            groups
        } else {
            groups
        };

        Ok(SplitResult { sentences, groups })
    }
}

impl PipelineBuilder {
    pub fn with_enhancer(mut self, enhancer: Box<dyn Enhancer>) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            splitter: self.splitter,
            marker: self.marker,
            llm: self.llm,
            parser: self.parser,
            gap_handler: self.gap_handler,
            enhancer: self.enhancer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txt_splitt::gap_handlers::StrictGapHandler;
    use crate::txt_splitt::markers::BracketMarker;
    use crate::txt_splitt::parsers::TopicRangeParser;
    use crate::txt_splitt::splitters::RegexSentenceSplitter;
    use crate::txt_splitt::types::MarkedText;

    struct StubLlm(&'static str);
    impl LlmStrategy for StubLlm {
        fn query(&self, _marked_text: &MarkedText) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn runs_all_stages_in_order() {
        let pipeline = Pipeline::builder(
            Box::new(RegexSentenceSplitter),
            Box::new(BracketMarker),
            Box::new(StubLlm("Topic: 0-1")),
            Box::new(TopicRangeParser),
            Box::new(StrictGapHandler),
        )
        .build();

        let result = pipeline.run("First sentence. Second sentence.", None).unwrap();
        assert_eq!(result.sentences.len(), 2);
        assert_eq!(result.groups.len(), 1);
    }

    #[test]
    fn records_spans_when_tracer_given() {
        let pipeline = Pipeline::builder(
            Box::new(RegexSentenceSplitter),
            Box::new(BracketMarker),
            Box::new(StubLlm("Topic: 0-1")),
            Box::new(TopicRangeParser),
            Box::new(StrictGapHandler),
        )
        .build();

        let tracer = Tracer::new();
        pipeline.run("First sentence. Second sentence.", Some(&tracer)).unwrap();
        let roots = tracer.spans();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].name, "pipeline.run");
        assert!(roots[0].children.iter().any(|c| c.name == "split"));
    }
}
