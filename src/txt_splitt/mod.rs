//! A modular, pipeline-based text splitter: splits a document into
//! sentences, asks an LLM to label hierarchical topic ranges over them, and
//! repairs/validates the result into a gapless, ordered [`SplitResult`].

pub mod chunkers;
pub mod enhancers;
pub mod gap_handlers;
pub mod html;
pub mod joiners;
pub mod markers;
pub mod normalizers;
pub mod offset_restorers;
pub mod parsers;
pub mod pipeline;
pub mod protocols;
pub mod splitters;
pub mod tracer;
pub mod types;

pub use chunkers::SizeBasedChunker;
pub use enhancers::ShortSentenceEnhancer;
pub use gap_handlers::{LlmRepairingGapHandler, RepairingGapHandler, StrictGapHandler};
pub use html::{HtmlAnalysis, HtmlTagStripCleaner, TagSpanScanner};
pub use joiners::{join_sentences_by_groups, AdjacentSameTopicJoiner};
pub use markers::BracketMarker;
pub use normalizers::NormalizingSplitter;
pub use offset_restorers::MappingOffsetRestorer;
pub use parsers::TopicRangeParser;
pub use pipeline::{Pipeline, PipelineBuilder};
pub use protocols::{Enhancer, GapHandler, LlmCallable, LlmStrategy, MarkedTextChunker, MarkerStrategy, ResponseParser, SentenceSplitter};
pub use splitters::{DenseRegexSentenceSplitter, HtmlAwareSentenceSplitter, RegexSentenceSplitter};
pub use tracer::Tracer;
pub use types::{MarkedText, OffsetMapping, OffsetSegment, Sentence, SentenceGroup, SentenceRange, SplitResult};
