use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Ingest;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Plan, Extract, Split, Embed, Replace, Store }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Plan => "plan",
        Phase::Extract => "extract",
        Phase::Split => "split",
        Phase::Embed => "embed",
        Phase::Replace => "replace",
        Phase::Store => "store",
    }}
    fn span(&self) -> Span { match self {
        Phase::Plan => info_span!("plan"),
        Phase::Extract => info_span!("extract"),
        Phase::Split => info_span!("split"),
        Phase::Embed => info_span!("embed"),
        Phase::Replace => info_span!("replace"),
        Phase::Store => info_span!("store"),
    }}
}

impl OpMarker for Ingest {
    const NAME: &'static str = "ingest";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("ingest") }
}
