//! The per-turn view handed to daemons and fuses.

use world_model::{EntityId, WorldModel};

use super::Fuse;
use crate::random::SeededRandom;

/// Changes a running behavior asks the scheduler to make.
///
/// Behaviors cannot touch the registries while the scheduler is iterating
/// them, so they queue requests on the context instead. The scheduler
/// applies them as soon as the requesting behavior has finished.
#[derive(Debug)]
pub enum SchedulerRequest {
    SetFuse(Fuse),
    PauseFuse(String),
    ResumeFuse(String),
    CancelFuse(String),
    AdjustFuse { id: String, delta: i64 },
    PauseDaemon(String),
    ResumeDaemon(String),
    RemoveDaemon(String),
}

/// World handle, turn, player and random source for one scheduler step.
///
/// Conditions get `&SchedulerContext` and therefore only a read-only world;
/// `run`, `trigger` and `on_cancel` get `&mut SchedulerContext` and may
/// mutate it.
pub struct SchedulerContext<'a> {
    world: &'a mut dyn WorldModel,
    random: &'a SeededRandom,
    pub turn: u64,
    pub player_id: EntityId,
    pub player_location: Option<EntityId>,
    requests: Vec<SchedulerRequest>,
}

impl<'a> SchedulerContext<'a> {
    pub fn new(
        world: &'a mut dyn WorldModel,
        random: &'a SeededRandom,
        turn: u64,
        player_id: EntityId,
    ) -> Self {
        let player_location = world.location_of(&player_id).cloned();
        Self {
            world,
            random,
            turn,
            player_id,
            player_location,
            requests: Vec::new(),
        }
    }

    pub fn world(&self) -> &(dyn WorldModel + 'a) {
        &*self.world
    }

    pub fn world_mut(&mut self) -> &mut (dyn WorldModel + 'a) {
        &mut *self.world
    }

    pub fn random(&self) -> &SeededRandom {
        self.random
    }

    /// True when the player is currently in `location`.
    pub fn player_is_in(&self, location: &EntityId) -> bool {
        self.player_location.as_ref() == Some(location)
    }

    pub fn set_fuse(&mut self, fuse: Fuse) {
        self.requests.push(SchedulerRequest::SetFuse(fuse));
    }

    pub fn pause_fuse(&mut self, id: impl Into<String>) {
        self.requests.push(SchedulerRequest::PauseFuse(id.into()));
    }

    pub fn resume_fuse(&mut self, id: impl Into<String>) {
        self.requests.push(SchedulerRequest::ResumeFuse(id.into()));
    }

    pub fn cancel_fuse(&mut self, id: impl Into<String>) {
        self.requests.push(SchedulerRequest::CancelFuse(id.into()));
    }

    pub fn adjust_fuse(&mut self, id: impl Into<String>, delta: i64) {
        self.requests.push(SchedulerRequest::AdjustFuse {
            id: id.into(),
            delta,
        });
    }

    pub fn pause_daemon(&mut self, id: impl Into<String>) {
        self.requests.push(SchedulerRequest::PauseDaemon(id.into()));
    }

    pub fn resume_daemon(&mut self, id: impl Into<String>) {
        self.requests.push(SchedulerRequest::ResumeDaemon(id.into()));
    }

    pub fn remove_daemon(&mut self, id: impl Into<String>) {
        self.requests.push(SchedulerRequest::RemoveDaemon(id.into()));
    }

    pub(crate) fn take_requests(&mut self) -> Vec<SchedulerRequest> {
        std::mem::take(&mut self.requests)
    }
}
