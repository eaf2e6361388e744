use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Chunk;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Read, Extract, Split }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Read => "read",
        Phase::Extract => "extract",
        Phase::Split => "split",
    }}
    fn span(&self) -> Span { match self {
        Phase::Read => info_span!("read"),
        Phase::Extract => info_span!("extract"),
        Phase::Split => info_span!("split"),
    }}
}

impl OpMarker for Chunk {
    const NAME: &'static str = "chunk";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("chunk") }
}
