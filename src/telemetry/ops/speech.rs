use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Transcribe;

#[derive(Copy, Clone, Debug)]
pub struct Speak;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Read, Request, Write }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Read => "read",
        Phase::Request => "request",
        Phase::Write => "write",
    }}
    fn span(&self) -> Span { match self {
        Phase::Read => info_span!("read"),
        Phase::Request => info_span!("request"),
        Phase::Write => info_span!("write"),
    }}
}

impl OpMarker for Transcribe {
    const NAME: &'static str = "transcribe";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("transcribe") }
}

impl OpMarker for Speak {
    const NAME: &'static str = "speak";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("speak") }
}
