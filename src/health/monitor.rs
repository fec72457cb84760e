use std::collections::{BTreeMap, HashSet};

use crate::container::{ContainerID, ContainerSnapshot, ContainerState};

use super::event::{HealthEvent, parse_exit_code};

/// Restart count above which a running container is reported as restart-looping.
pub const RESTART_LOOP_THRESHOLD: u32 = 3;

#[derive(Debug, Clone)]
struct Tracked {
    name: String,
    state: ContainerState,
    unhealthy_reported: bool,
    reported_restart_count: u32,
}

/// Tracks the last observed state of every container and derives alerts.
///
/// The first observation of a container only records its baseline. Afterwards,
/// state changes between polls produce [`HealthEvent`]s; failing health checks
/// and restart loops are reported once when they begin.
#[derive(Debug)]
pub struct HealthMonitor {
    history: BTreeMap<ContainerID, Tracked>,
    restart_threshold: u32,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(RESTART_LOOP_THRESHOLD)
    }
}

impl HealthMonitor {
    pub fn new(restart_threshold: u32) -> Self {
        Self {
            history: BTreeMap::new(),
            restart_threshold,
        }
    }

    /// Feeds one successful poll and returns the resulting events.
    ///
    /// Containers missing from `snapshots` are reported as removed and forgotten.
    pub fn observe(&mut self, snapshots: &[ContainerSnapshot]) -> Vec<HealthEvent> {
        let mut events = Vec::new();

        for snapshot in snapshots {
            let tracked = match self.history.get_mut(&snapshot.id) {
                Some(tracked) => {
                    if tracked.state != snapshot.state {
                        log::debug!(
                            "container {} changed state: {} -> {}",
                            snapshot.name,
                            tracked.state,
                            snapshot.state
                        );
                        events.extend(transition(tracked.state, snapshot));
                        tracked.state = snapshot.state;
                    }
                    tracked.name.clone_from(&snapshot.name);
                    tracked
                }
                None => {
                    log::debug!(
                        "tracking container {} ({}) in state {}",
                        snapshot.name,
                        snapshot.id.short(),
                        snapshot.state
                    );
                    self.history
                        .entry(snapshot.id.clone())
                        .or_insert_with(|| Tracked {
                            name: snapshot.name.clone(),
                            state: snapshot.state,
                            unhealthy_reported: false,
                            reported_restart_count: 0,
                        })
                }
            };

            if snapshot.state == ContainerState::Running {
                check_running(tracked, snapshot, self.restart_threshold, &mut events);
            }
        }

        let live: HashSet<&ContainerID> = snapshots.iter().map(|s| &s.id).collect();
        self.history.retain(|container_id, tracked| {
            if live.contains(container_id) {
                return true;
            }
            log::debug!("container {} ({}) disappeared", tracked.name, container_id.short());
            events.push(HealthEvent::Removed {
                name: tracked.name.clone(),
            });
            false
        });

        events
    }

    /// Last observed state, `None` while unknown.
    pub fn state_of(&self, container_id: &ContainerID) -> Option<ContainerState> {
        self.history.get(container_id).map(|tracked| tracked.state)
    }

    pub fn size(&self) -> usize {
        self.history.len()
    }
}

fn transition(previous: ContainerState, current: &ContainerSnapshot) -> Option<HealthEvent> {
    let name = current.name.clone();
    match (previous, current.state) {
        (_, ContainerState::Restarting) => Some(HealthEvent::Restarting { name }),
        (ContainerState::Running, ContainerState::Exited) => {
            match parse_exit_code(&current.status) {
                Some(0) => None,
                exit_code => Some(HealthEvent::StoppedUnexpectedly { name, exit_code }),
            }
        }
        (ContainerState::Exited, ContainerState::Running) => Some(HealthEvent::Started { name }),
        _ => None,
    }
}

/// Checks the conditions polled while a container is running.
///
/// Both are edge-triggered so a steady condition does not repeat its alert every
/// refresh interval: unhealthy re-arms once the container is seen healthy, a
/// restart loop re-fires only when the count grows.
fn check_running(
    tracked: &mut Tracked,
    snapshot: &ContainerSnapshot,
    restart_threshold: u32,
    events: &mut Vec<HealthEvent>,
) {
    if snapshot.is_unhealthy() {
        if !tracked.unhealthy_reported {
            tracked.unhealthy_reported = true;
            events.push(HealthEvent::Unhealthy {
                name: snapshot.name.clone(),
            });
        }
    } else {
        tracked.unhealthy_reported = false;
    }

    if snapshot.restart_count > restart_threshold
        && snapshot.restart_count > tracked.reported_restart_count
    {
        tracked.reported_restart_count = snapshot.restart_count;
        events.push(HealthEvent::RestartLoop {
            name: snapshot.name.clone(),
            restart_count: snapshot.restart_count,
        });
    }
}
