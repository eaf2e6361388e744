use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Ask;

#[derive(Copy, Clone, Debug)]
pub enum Phase { EmbedQuery, Retrieve, Prompt, Complete }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::EmbedQuery => "embed_query",
        Phase::Retrieve => "retrieve",
        Phase::Prompt => "prompt",
        Phase::Complete => "complete",
    }}
    fn span(&self) -> Span { match self {
        Phase::EmbedQuery => info_span!("embed_query"),
        Phase::Retrieve => info_span!("retrieve"),
        Phase::Prompt => info_span!("prompt"),
        Phase::Complete => info_span!("complete"),
    }}
}

impl OpMarker for Ask {
    const NAME: &'static str = "ask";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("ask") }
}
