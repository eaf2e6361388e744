use anyhow::Result;
use serde::Serialize;
use std::marker::PhantomData;
use std::time::Instant;
use tracing::{info, debug, warn, error, Span};

use crate::output::{Emitter, Envelope, OutputConfig};

pub trait PhaseSpan {
    fn name(&self) -> &'static str;
    fn span(&self) -> Span;
}

pub trait OpMarker {
    const NAME: &'static str;
    type Phase: PhaseSpan;
    fn root_span() -> Span;
}

pub struct LogCtx<O: OpMarker> {
    pub(crate) json: bool,
    pub(crate) started: Instant,
    pub(crate) _marker: PhantomData<O>,
}

impl<O: OpMarker> LogCtx<O> {
    fn op_name(&self) -> &'static str { O::NAME }

    pub fn root_span(&self) -> Span { O::root_span() }

    pub fn root_span_kv<'a, T>(&self, fields: T) -> Span
    where
        T: IntoIterator<Item = (&'a str, String)>,
    {
        let span = self.root_span();
        let details = kv_to_string(fields);
        if details.is_empty() {
            info!(op = %self.op_name(), "start");
        } else {
            info!(op = %self.op_name(), details = %details, "start");
        }
        span
    }

    pub fn span(&self, ph: &O::Phase) -> Span {
        if self.json { debug!(op = %self.op_name(), phase = ph.name(), "span_start"); }
        ph.span()
    }

    pub fn info(&self, msg: impl AsRef<str>) { if self.json { info!(op = %self.op_name(), "{}", msg.as_ref()); } else { info!("{}", msg.as_ref()); } }
    pub fn debug(&self, msg: impl AsRef<str>) { if self.json { debug!(op = %self.op_name(), "{}", msg.as_ref()); } else { debug!("{}", msg.as_ref()); } }
    pub fn warn(&self, msg: impl AsRef<str>) { if self.json { warn!(op = %self.op_name(), "{}", msg.as_ref()); } else { warn!("{}", msg.as_ref()); } }
    pub fn error(&self, msg: impl AsRef<str>) { if self.json { error!(op = %self.op_name(), "{}", msg.as_ref()); } else { error!("{}", msg.as_ref()); } }

    pub fn info_kv<'a, D>(&self, msg: &str, kv: D)
    where
        D: IntoIterator<Item = (&'a str, String)>,
    {
        if self.json { let details = kv_to_string(kv); info!(op = %self.op_name(), details = %details, "{}", msg); }
        else { info!("{}", msg); }
    }

    pub fn warn_kv<'a, D>(&self, msg: &str, kv: D)
    where
        D: IntoIterator<Item = (&'a str, String)>,
    {
        if self.json { let details = kv_to_string(kv); warn!(op = %self.op_name(), details = %details, "{}", msg); }
        else { warn!("{}", msg); }
    }

    /// Emit a plan envelope on stdout.
    pub fn plan<T: Serialize>(&self, plan: &T) -> Result<()> {
        let env = Envelope::plan(self.op_name(), plan)?;
        Emitter::from_env(OutputConfig::from_env()).emit(&env)?;
        Ok(())
    }

    /// Emit a result envelope on stdout, timed from when this context was made.
    pub fn result<T: Serialize>(&self, result: &T) -> Result<()> {
        let env = Envelope::result(self.op_name(), result, Some(self.started.elapsed()))?;
        Emitter::from_env(OutputConfig::from_env()).emit(&env)?;
        Ok(())
    }
}

impl LogCtx<crate::telemetry::ops::ingest::Ingest> {
    pub fn summary(&self, source: &str, text_chars: usize, chunks: usize, stored: usize) {
        if self.json { info!(op = %self.op_name(), source, text_chars, chunks, stored, "ingest_summary"); }
        else { info!("✅ {} — text_chars={} chunks={} stored={}", source, text_chars, chunks, stored); }
    }
}

fn kv_to_string<'a, T>(kv: T) -> String
where
    T: IntoIterator<Item = (&'a str, String)>,
{
    let mut parts: Vec<String> = Vec::new();
    for (k, v) in kv { parts.push(format!("{}={}", k, v)); }
    parts.join(" ")
}
