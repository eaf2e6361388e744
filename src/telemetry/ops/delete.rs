use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Delete;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Plan, Delete }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::Plan => "plan", Phase::Delete => "delete" } }
    fn span(&self) -> Span { match self { Phase::Plan => info_span!("plan"), Phase::Delete => info_span!("delete") } }
}

impl OpMarker for Delete {
    const NAME: &'static str = "delete";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("delete") }
}
