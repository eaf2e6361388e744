pub mod config;
pub mod ctx;
pub mod ops;

use std::marker::PhantomData;
use std::time::Instant;

use ctx::LogCtx;

fn ctx<O: ctx::OpMarker>() -> LogCtx<O> { LogCtx { json: config::logs_are_json(), started: Instant::now(), _marker: PhantomData } }

pub fn init() -> LogCtx<ops::init::Init> { ctx() }
pub fn chunk() -> LogCtx<ops::chunk::Chunk> { ctx() }
pub fn ingest() -> LogCtx<ops::ingest::Ingest> { ctx() }
pub fn ask() -> LogCtx<ops::ask::Ask> { ctx() }
pub fn delete() -> LogCtx<ops::delete::Delete> { ctx() }
pub fn transcribe() -> LogCtx<ops::speech::Transcribe> { ctx() }
pub fn speak() -> LogCtx<ops::speech::Speak> { ctx() }
pub fn serve() -> LogCtx<ops::serve::Serve> { ctx() }
