// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the bridge between the control cycle and an external inverse kinematics service.
//!
//! The control cycle only ever enqueues requests. A dedicated worker thread forwards them to the
//! [`IkService`], waits for the answers and publishes every successful solution into the shared
//! [`DesiredJointConfiguration`]. Failed requests leave the last solution untouched.
//!
//! Every request carries the generation it was dispatched in. [`IkResolverBridge::reset`] starts
//! a new generation, so answers to older requests are never published.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use crossbeam_channel::{Receiver, Sender, TrySendError};
#[cfg(test)]
use mockall::automock;
use tracing::{debug, info, warn};

use crate::exception::{TeleopException, TeleopResult};
use crate::robot::control_types::CartesianPose;
use crate::robot::robot_state::JointState;
use crate::robot::service_types::{IkRequest, IkResponse};
use crate::utils::{joint_names, Vector7, NUM_JOINTS};

/// An inverse kinematics service, e.g. a MoveIt `compute_ik` client.
///
/// [`compute_ik`](`Self::compute_ik`) may block. It is only called from the bridge's worker
/// thread, never from the control cycle.
#[cfg_attr(test, automock)]
pub trait IkService: Send {
    /// Waits up to `timeout` for the service to become available.
    fn wait_for_service(&self, timeout: Duration) -> bool;
    /// Solves one request.
    /// # Errors
    /// * SolverException if the request could not be delivered or no answer was received.
    fn compute_ik(&mut self, request: &IkRequest) -> TeleopResult<IkResponse>;
}

impl<S: IkService + ?Sized> IkService for Box<S> {
    fn wait_for_service(&self, timeout: Duration) -> bool {
        (**self).wait_for_service(timeout)
    }
    fn compute_ik(&mut self, request: &IkRequest) -> TeleopResult<IkResponse> {
        (**self).compute_ik(request)
    }
}

/// Desired joint positions shared between the solver worker and the control cycle.
///
/// Starts out empty. Only the solver worker publishes into it. Every publish replaces the whole
/// configuration at once, so readers never observe a partially written vector.
#[derive(Clone, Default)]
pub struct DesiredJointConfiguration {
    inner: Arc<ArcSwapOption<Vector7>>,
}

impl DesiredJointConfiguration {
    pub fn new() -> Self {
        DesiredJointConfiguration::default()
    }

    /// Latest published configuration, `None` if no solution was received yet.
    pub fn get(&self) -> Option<Vector7> {
        (*self.inner.load()).as_ref().map(|q_d| **q_d)
    }

    pub fn is_set(&self) -> bool {
        self.inner.load().is_some()
    }

    pub fn publish(&self, q_d: Vector7) {
        self.inner.store(Some(Arc::new(q_d)));
    }

    pub fn clear(&self) {
        self.inner.store(None);
    }
}

/// Applies one solver answer to the desired configuration.
///
/// Returns true if the configuration was replaced. Answers which do not report success, or
/// whose solution is not exactly one finite value per joint, are logged and ignored.
pub fn apply_response(desired: &DesiredJointConfiguration, response: &IkResponse) -> bool {
    let result = response.result();
    if !result.is_success() {
        info!(result = %result, "Inverse kinematics solution failed.");
        return false;
    }
    if response.solution.len() != NUM_JOINTS || response.solution.iter().any(|q| !q.is_finite()) {
        warn!(
            len = response.solution.len(),
            "Inverse kinematics returned an invalid solution, keeping the previous one."
        );
        return false;
    }
    desired.publish(Vector7::from_column_slice(&response.solution));
    true
}

/// Builds the requests for one arm. All names are composed once.
#[derive(Debug, Clone)]
pub struct IkRequestBuilder {
    group_name: Arc<str>,
    frame_id: Arc<str>,
    joint_names: Arc<[String; NUM_JOINTS]>,
    ik_link_name: Option<Arc<str>>,
}

impl IkRequestBuilder {
    /// # Arguments
    /// * `arm_id` - Identifier of the arm, e.g. `fr3`.
    /// * `load_gripper` - Whether the hand is mounted. The target then refers to its TCP.
    pub fn new(arm_id: &str, load_gripper: bool) -> Self {
        IkRequestBuilder {
            group_name: format!("{}_arm", arm_id).into(),
            frame_id: format!("{}_link0", arm_id).into(),
            joint_names: Arc::new(joint_names(arm_id)),
            ik_link_name: if load_gripper {
                Some(format!("{}_hand_tcp", arm_id).into())
            } else {
                None
            },
        }
    }

    pub fn build(&self, pose: CartesianPose, joint_state: JointState) -> IkRequest {
        IkRequest {
            group_name: self.group_name.clone(),
            frame_id: self.frame_id.clone(),
            pose,
            joint_names: self.joint_names.clone(),
            joint_state,
            ik_link_name: self.ik_link_name.clone(),
        }
    }
}

/// Counters of the bridge, readable from any thread.
#[derive(Debug, Default)]
pub struct IkBridgeStatistics {
    dispatched: AtomicU64,
    dropped: AtomicU64,
    solved: AtomicU64,
    failed: AtomicU64,
    discarded: AtomicU64,
}

impl IkBridgeStatistics {
    /// Requests handed to the worker.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }
    /// Requests evicted from a full queue by a newer one, or discarded by a reset.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
    /// Answers which updated the desired configuration.
    pub fn solved(&self) -> u64 {
        self.solved.load(Ordering::Relaxed)
    }
    /// Answers which reported a failure, or requests the service did not answer.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
    /// Answers to requests of an earlier generation.
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

struct PendingRequest {
    generation: u64,
    request: IkRequest,
}

/// Generation counter shared with the worker. Publishing an answer and starting a new generation
/// exclude each other.
#[derive(Default)]
struct Generation {
    current: AtomicU64,
    publishing: Mutex<()>,
}

impl Generation {
    fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }
}

/// Non-blocking front end of the inverse kinematics worker.
pub struct IkResolverBridge {
    builder: IkRequestBuilder,
    sender: Option<Sender<PendingRequest>>,
    pending: Receiver<PendingRequest>,
    worker: Option<JoinHandle<()>>,
    desired: DesiredJointConfiguration,
    generation: Arc<Generation>,
    statistics: Arc<IkBridgeStatistics>,
}

impl IkResolverBridge {
    /// Spawns the worker thread.
    /// # Arguments
    /// * `service` - Solver the worker forwards the requests to.
    /// * `builder` - Builds the requests of the arm.
    /// * `desired` - Configuration the solutions are published into.
    /// * `queue_depth` - Maximum number of requests waiting for the worker.
    /// # Errors
    /// * StartupException if the worker thread cannot be spawned.
    pub fn start<S: IkService + 'static>(
        service: S,
        builder: IkRequestBuilder,
        desired: DesiredJointConfiguration,
        queue_depth: usize,
    ) -> TeleopResult<Self> {
        let (sender, receiver) = crossbeam_channel::bounded(queue_depth.max(1));
        let statistics = Arc::new(IkBridgeStatistics::default());
        let generation = Arc::new(Generation::default());
        let pending = receiver.clone();
        let worker = {
            let desired = desired.clone();
            let generation = generation.clone();
            let statistics = statistics.clone();
            std::thread::Builder::new()
                .name("ik-resolver".to_string())
                .spawn(move || resolve_requests(service, receiver, desired, generation, statistics))
                .map_err(|error| TeleopException::StartupException {
                    message: format!("unable to spawn inverse kinematics worker: {}", error),
                })?
        };
        Ok(IkResolverBridge {
            builder,
            sender: Some(sender),
            pending,
            worker: Some(worker),
            desired,
            generation,
            statistics,
        })
    }

    /// Enqueues a request for the given target and returns immediately.
    ///
    /// If the worker is still busy and the queue is full, the oldest waiting request is evicted
    /// so the newest target always reaches the solver. Returns false if the request could not be
    /// enqueued at all.
    pub fn dispatch(&self, target: CartesianPose, joint_state: JointState) -> bool {
        let sender = match &self.sender {
            Some(sender) => sender,
            None => return false,
        };
        let request = PendingRequest {
            generation: self.generation.current(),
            request: self.builder.build(target, joint_state),
        };
        let request = match sender.try_send(request) {
            Ok(()) => {
                self.statistics.dispatched.fetch_add(1, Ordering::Relaxed);
                return true;
            }
            Err(TrySendError::Full(request)) => request,
            Err(TrySendError::Disconnected(_)) => {
                self.statistics.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };
        if self.pending.try_recv().is_ok() {
            self.statistics.dropped.fetch_add(1, Ordering::Relaxed);
            debug!("inverse kinematics queue is full, evicting the oldest request");
        }
        match sender.try_send(request) {
            Ok(()) => {
                self.statistics.dispatched.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                self.statistics.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Starts a new generation: waiting requests are discarded, answers to requests which were
    /// dispatched before are ignored and the desired configuration is cleared.
    pub fn reset(&self) {
        let _publishing = self
            .generation
            .publishing
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.generation.current.fetch_add(1, Ordering::AcqRel);
        let mut discarded = 0;
        while self.pending.try_recv().is_ok() {
            discarded += 1;
        }
        self.statistics.dropped.fetch_add(discarded, Ordering::Relaxed);
        self.desired.clear();
    }

    pub fn statistics(&self) -> Arc<IkBridgeStatistics> {
        self.statistics.clone()
    }

    /// Closes the queue and waits until the worker has answered the pending requests.
    pub fn shutdown(&mut self) {
        self.sender = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("inverse kinematics worker panicked");
            }
        }
    }
}

impl Drop for IkResolverBridge {
    fn drop(&mut self) {
        // closing the queue lets the worker finish on its own, a stuck service must not block
        // the owner
        self.sender = None;
    }
}

fn resolve_requests<S: IkService>(
    mut service: S,
    requests: Receiver<PendingRequest>,
    desired: DesiredJointConfiguration,
    generation: Arc<Generation>,
    statistics: Arc<IkBridgeStatistics>,
) {
    for pending in requests.iter() {
        let result = service.compute_ik(&pending.request);
        let _publishing = generation
            .publishing
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if pending.generation != generation.current() {
            statistics.discarded.fetch_add(1, Ordering::Relaxed);
            debug!("discarding inverse kinematics answer of an earlier generation");
            continue;
        }
        let applied = match result {
            Ok(response) => apply_response(&desired, &response),
            Err(error) => {
                warn!(%error, "Inverse kinematics request failed.");
                false
            }
        };
        if applied {
            statistics.solved.fetch_add(1, Ordering::Relaxed);
        } else {
            statistics.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
    debug!("inverse kinematics worker finished");
}
