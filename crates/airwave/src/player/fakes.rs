//! Scripted media element and counting audio backend for player tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::audio::types::ContextStateCell;
use crate::audio::{AudioBackend, AudioContext, GraphTap, SoftwareContext};
use crate::error::{PlayerError, Result};
use crate::media::{MediaElement, MediaEvent, MediaSource};

#[derive(Debug, Clone, PartialEq)]
pub enum ElementCall {
    Load(String),
    Play(u64),
    Pause,
    SetVolume(f32),
    Route,
    Detach,
}

/// Records every call; events are queued by the test with `push`
#[derive(Default)]
pub struct FakeElement {
    pub calls: Vec<ElementCall>,
    pub volume: f32,
    pub routed: usize,
    pub fail_route: bool,
    pub tap: Option<GraphTap>,
    queue: VecDeque<MediaEvent>,
}

impl FakeElement {
    pub fn push(&mut self, event: MediaEvent) {
        self.queue.push_back(event);
    }

    /// Generation of the newest play request
    pub fn last_play(&self) -> Option<u64> {
        self.calls.iter().rev().find_map(|c| match c {
            ElementCall::Play(generation) => Some(*generation),
            _ => None,
        })
    }

    pub fn play_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, ElementCall::Play(_)))
            .count()
    }
}

impl MediaElement for FakeElement {
    fn load(&mut self, source: &MediaSource) {
        self.calls.push(ElementCall::Load(source.url.clone()));
    }

    fn play(&mut self, generation: u64) {
        self.calls.push(ElementCall::Play(generation));
    }

    fn pause(&mut self) {
        self.calls.push(ElementCall::Pause);
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        self.calls.push(ElementCall::SetVolume(volume));
    }

    fn route_through(&mut self, tap: GraphTap) -> Result<()> {
        if self.fail_route {
            return Err(PlayerError::Graph("element cannot be routed".to_string()));
        }
        self.routed += 1;
        self.tap = Some(tap);
        self.calls.push(ElementCall::Route);
        Ok(())
    }

    fn detach(&mut self) {
        self.calls.push(ElementCall::Detach);
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        self.queue.pop_front()
    }
}

#[derive(Default)]
struct Counters {
    create_attempts: AtomicUsize,
    created: AtomicUsize,
    closed: AtomicUsize,
}

/// Backend handing out suspended software contexts and counting their lifecycle
#[derive(Clone, Default)]
pub struct FakeBackend {
    pub fail_create: bool,
    pub fail_resume: bool,
    pub(crate) counters: Arc<Counters>,
}

impl FakeBackend {
    pub fn create_attempts(&self) -> usize {
        self.counters.create_attempts.load(Ordering::SeqCst)
    }

    pub fn contexts_created(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    pub fn contexts_closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }
}

impl AudioBackend for FakeBackend {
    fn create_context(&mut self) -> Result<Box<dyn AudioContext>> {
        self.counters.create_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_create {
            return Err(PlayerError::Context("no audio device".to_string()));
        }
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeContext {
            inner: SoftwareContext::default(),
            fail_resume: self.fail_resume,
            counters: self.counters.clone(),
        }))
    }
}

struct FakeContext {
    inner: SoftwareContext,
    fail_resume: bool,
    counters: Arc<Counters>,
}

impl AudioContext for FakeContext {
    fn state_cell(&self) -> ContextStateCell {
        self.inner.state_cell()
    }

    fn resume(&mut self) -> Result<()> {
        if self.fail_resume {
            return Err(PlayerError::Context("resume refused".to_string()));
        }
        self.inner.resume()
    }

    fn close(&mut self) -> Result<()> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        self.inner.close()
    }
}
