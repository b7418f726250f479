use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info};
use rocket::{
    fairing::{Fairing, Info, Kind},
    tokio::sync::{broadcast, RwLock, RwLockReadGuard},
    Orbit, Rocket,
};

use crate::error::Result;
use crate::model::{
    api::tally::{PositionTally, TallySnapshot, TallyUpdate, TallyView},
    db::ballot::Ballot,
    mongodb::Id,
};
use crate::Backends;

/// The live tally of one election, and the observers following it.
struct ElectionChannel {
    election_id: Id,
    view: TallyView,
    sender: broadcast::Sender<TallyUpdate>,
}

/// What a new observer receives: the full tally now, then every change.
pub struct TallySubscription {
    pub snapshot: TallySnapshot,
    pub updates: broadcast::Receiver<TallyUpdate>,
}

/// Keeps the per-candidate counts of the active election in memory and fans
/// out an update for every committed ballot.
///
/// Rebuilds from the ledger take the commit gate exclusively, while ballot
/// inserts hold it shared until their update has been applied. A rebuilt view
/// therefore never misses or double counts an in-flight ballot. Rebuilds
/// happen at launch, on the active-election hook, and when no view follows
/// the active election; reads are served from memory.
///
/// The view only sees ballots committed by this process. With several
/// instances sharing one ledger, observers of one instance miss the ballots
/// of the others until the active-election hook rebuilds the view.
pub struct TallyBroadcaster {
    commit_gate: RwLock<()>,
    channel: Mutex<Option<ElectionChannel>>,
    capacity: usize,
}

impl TallyBroadcaster {
    /// `capacity` is how many updates a slow observer may fall behind before
    /// it has to be resynchronised.
    pub fn new(capacity: usize) -> Self {
        Self {
            commit_gate: RwLock::new(()),
            channel: Mutex::new(None),
            capacity: capacity.max(1),
        }
    }

    /// Hold this across a ballot insert and the matching [`Self::ballot_committed`].
    pub async fn commit_guard(&self) -> RwLockReadGuard<'_, ()> {
        self.commit_gate.read().await
    }

    /// Count a committed ballot and notify observers. Ballots for positions
    /// outside the followed election are ignored.
    pub fn ballot_committed(&self, ballot: &Ballot) {
        let mut channel = self.lock();
        let Some(channel) = channel.as_mut() else {
            return;
        };
        let update = TallyUpdate::increment(ballot.position_id, ballot.candidate_id);
        if channel.view.apply(&update) && channel.sender.send(update).is_err() {
            debug!("No tally observers for election {}", channel.election_id);
        }
    }

    /// Subscribe a new observer to the tally of the active election. `None`
    /// if no election is active.
    ///
    /// The in-memory view is served as long as it follows the active
    /// election. Only a missing or stale view is rebuilt from the ledger,
    /// which holds up ballot commits for the duration.
    pub async fn subscribe(&self, backends: &Backends) -> Result<Option<TallySubscription>> {
        let Some(election) = backends.registry.active_election().await? else {
            if let Some(stale) = self.lock().take() {
                info!("No active election, closing tally for {}", stale.election_id);
            }
            return Ok(None);
        };
        if let Some(subscription) = self.resubscribe(election.id) {
            return Ok(Some(subscription));
        }

        let _gate = self.commit_gate.write().await;
        // Another observer may have rebuilt the view while we waited.
        if let Some(subscription) = self.resubscribe(election.id) {
            return Ok(Some(subscription));
        }
        Ok(match self.resync(backends).await? {
            Some(election_id) => self.resubscribe(election_id),
            None => None,
        })
    }

    /// Subscribe again from the in-memory view, e.g. after falling behind.
    /// `None` if the given election is no longer the one followed.
    pub fn resubscribe(&self, election_id: Id) -> Option<TallySubscription> {
        let channel = self.lock();
        let channel = channel.as_ref().filter(|c| c.election_id == election_id)?;
        Some(TallySubscription {
            snapshot: TallySnapshot {
                election_id,
                snapshot: channel.view.clone(),
            },
            updates: channel.sender.subscribe(),
        })
    }

    /// The current tally of the active election.
    pub async fn snapshot(&self, backends: &Backends) -> Result<Option<TallySnapshot>> {
        Ok(self
            .subscribe(backends)
            .await?
            .map(|subscription| subscription.snapshot))
    }

    /// Hook for the administrators: the active election may have changed.
    ///
    /// Observers of a stale election are disconnected and the view is rebuilt
    /// from the ledger. Returns the election now followed.
    pub async fn active_election_changed(&self, backends: &Backends) -> Result<Option<Id>> {
        let _gate = self.commit_gate.write().await;
        self.resync(backends).await
    }

    /// Must be called with the commit gate held exclusively.
    async fn resync(&self, backends: &Backends) -> Result<Option<Id>> {
        let election = match backends.registry.active_election().await? {
            Some(election) => election,
            None => {
                if let Some(stale) = self.lock().take() {
                    info!("No active election, closing tally for {}", stale.election_id);
                }
                return Ok(None);
            }
        };
        let view = rebuild_view(backends, election.id).await?;

        let mut channel = self.lock();
        match channel.as_mut() {
            Some(current) if current.election_id == election.id => current.view = view,
            _ => {
                let (sender, _) = broadcast::channel(self.capacity);
                let fresh = ElectionChannel {
                    election_id: election.id,
                    view,
                    sender,
                };
                if let Some(stale) = channel.replace(fresh) {
                    info!(
                        "Active election changed from {} to {}, closing stale tally",
                        stale.election_id, election.id
                    );
                } else {
                    info!("Following tally of election {}", election.id);
                }
            }
        }
        Ok(Some(election.id))
    }

    fn lock(&self) -> MutexGuard<'_, Option<ElectionChannel>> {
        self.channel.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Recompute an election's tally from the ledger. Candidates without votes
/// are listed with zero.
async fn rebuild_view(backends: &Backends, election_id: Id) -> Result<TallyView> {
    let mut view = TallyView::new();
    for position in backends.registry.positions_for(election_id).await? {
        let mut counts = backends.ledger.count_by_candidate(position.id).await?;
        for candidate in backends.registry.candidates_for(position.id).await? {
            counts.entry(candidate.id).or_insert(0);
        }
        view.insert_position(position.id, PositionTally::from(counts));
    }
    Ok(view)
}

/// A fairing that seeds the tally of the active election at launch.
pub struct TallyFairing;

#[rocket::async_trait]
impl Fairing for TallyFairing {
    fn info(&self) -> Info {
        Info {
            name: "Tally",
            kind: Kind::Liftoff,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let (Some(broadcaster), Some(backends)) = (
            rocket.state::<Arc<TallyBroadcaster>>(),
            rocket.state::<Backends>(),
        ) else {
            return;
        };
        match broadcaster.active_election_changed(backends).await {
            Ok(Some(election_id)) => info!("Seeded tally for election {election_id}"),
            Ok(None) => info!("No active election at launch"),
            Err(e) => log::error!("Failed to seed tally: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::tokio::sync::broadcast::error::{RecvError, TryRecvError};

    use super::*;
    use crate::abuse::MemoryAbuseLog;
    use crate::ledger::{BallotLedger, MemoryLedger};
    use crate::model::{
        common::election::ElectionStatus,
        db::{
            ballot::BallotDraft,
            election::{Candidate, Election, Position},
        },
    };
    use crate::registry::MemoryRegistry;

    struct Fixture {
        backends: Backends,
        ledger: Arc<MemoryLedger>,
        registry: Arc<MemoryRegistry>,
        election: Election,
        position: Position,
        alice: Candidate,
        bob: Candidate,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(MemoryLedger::new());
        let registry = Arc::new(MemoryRegistry::new());
        let election = Election::current_example();
        let position = Position::example(&election, "President");
        let alice = Candidate::example(&position, "Alice");
        let bob = Candidate::example(&position, "Bob");
        registry.add_election(election.clone());
        registry.add_position(position.clone());
        registry.add_candidate(alice.clone());
        registry.add_candidate(bob.clone());
        let backends = Backends {
            ledger: ledger.clone(),
            registry: registry.clone(),
            abuse: Arc::new(MemoryAbuseLog::new()),
        };
        Fixture {
            backends,
            ledger,
            registry,
            election,
            position,
            alice,
            bob,
        }
    }

    /// Insert and announce a ballot the way the admission pipeline does.
    async fn commit(f: &Fixture, broadcaster: &TallyBroadcaster, voter: &str, candidate: Id) {
        let _gate = broadcaster.commit_guard().await;
        let ballot = f
            .ledger
            .insert(BallotDraft::example(voter, f.position.id, candidate))
            .await
            .unwrap();
        broadcaster.ballot_committed(&ballot);
    }

    #[rocket::async_test]
    async fn snapshot_is_rebuilt_from_ledger() {
        let f = fixture();
        let broadcaster = TallyBroadcaster::new(16);

        // Ballots committed while nobody follows the tally are not lost.
        commit(&f, &broadcaster, "A", f.alice.id).await;
        commit(&f, &broadcaster, "B", f.alice.id).await;

        let subscription = broadcaster.subscribe(&f.backends).await.unwrap().unwrap();
        let snapshot = subscription.snapshot;
        assert_eq!(snapshot.election_id, f.election.id);
        assert_eq!(snapshot.snapshot.count(f.position.id, f.alice.id), 2);
        assert_eq!(
            snapshot.snapshot.position(f.position.id).unwrap().count(f.bob.id),
            0
        );
    }

    #[rocket::async_test]
    async fn updates_fan_out_to_every_observer() {
        let f = fixture();
        let broadcaster = TallyBroadcaster::new(16);
        let mut first = broadcaster.subscribe(&f.backends).await.unwrap().unwrap();
        let mut second = broadcaster.subscribe(&f.backends).await.unwrap().unwrap();

        commit(&f, &broadcaster, "A", f.bob.id).await;

        let expected = TallyUpdate::increment(f.position.id, f.bob.id);
        assert_eq!(first.updates.recv().await.unwrap(), expected);
        assert_eq!(second.updates.recv().await.unwrap(), expected);

        let snapshot = broadcaster.snapshot(&f.backends).await.unwrap().unwrap();
        assert_eq!(snapshot.snapshot.count(f.position.id, f.bob.id), 1);
    }

    #[rocket::async_test]
    async fn foreign_positions_are_ignored() {
        let f = fixture();
        let broadcaster = TallyBroadcaster::new(16);
        let mut subscription = broadcaster.subscribe(&f.backends).await.unwrap().unwrap();

        let stray = f
            .ledger
            .insert(BallotDraft::example("A", Id::new(), f.alice.id))
            .await
            .unwrap();
        broadcaster.ballot_committed(&stray);

        assert!(matches!(
            subscription.updates.try_recv(),
            Err(TryRecvError::Empty)
        ));
    }

    #[rocket::async_test]
    async fn no_active_election_means_no_subscriptions() {
        let f = fixture();
        let broadcaster = TallyBroadcaster::new(16);
        let mut subscription = broadcaster.subscribe(&f.backends).await.unwrap().unwrap();

        f.registry.set_status(f.election.id, ElectionStatus::Closed);
        assert_eq!(
            broadcaster.active_election_changed(&f.backends).await.unwrap(),
            None
        );

        // The stale observer is disconnected and new ones are refused.
        assert!(matches!(
            subscription.updates.recv().await,
            Err(RecvError::Closed)
        ));
        assert!(broadcaster.subscribe(&f.backends).await.unwrap().is_none());
        assert!(broadcaster.resubscribe(f.election.id).is_none());
    }

    #[rocket::async_test]
    async fn switching_elections_drops_stale_observers() {
        let f = fixture();
        let broadcaster = TallyBroadcaster::new(16);
        let mut stale = broadcaster.subscribe(&f.backends).await.unwrap().unwrap();

        let next = Election::current_example();
        let position = Position::example(&next, "Secretary");
        f.registry.set_status(f.election.id, ElectionStatus::Closed);
        f.registry.add_election(next.clone());
        f.registry.add_position(position.clone());

        assert_eq!(
            broadcaster.active_election_changed(&f.backends).await.unwrap(),
            Some(next.id)
        );
        assert!(matches!(stale.updates.recv().await, Err(RecvError::Closed)));

        let fresh = broadcaster.subscribe(&f.backends).await.unwrap().unwrap();
        assert_eq!(fresh.snapshot.election_id, next.id);
        assert!(fresh.snapshot.snapshot.position(position.id).is_some());
        assert!(fresh.snapshot.snapshot.position(f.position.id).is_none());
    }

    #[rocket::async_test]
    async fn lagging_observer_can_resubscribe() {
        let f = fixture();
        let broadcaster = TallyBroadcaster::new(1);
        let mut subscription = broadcaster.subscribe(&f.backends).await.unwrap().unwrap();

        commit(&f, &broadcaster, "A", f.alice.id).await;
        commit(&f, &broadcaster, "B", f.alice.id).await;
        assert!(matches!(
            subscription.updates.recv().await,
            Err(RecvError::Lagged(_))
        ));

        let caught_up = broadcaster.resubscribe(f.election.id).unwrap();
        assert_eq!(caught_up.snapshot.snapshot.count(f.position.id, f.alice.id), 2);
    }

    #[rocket::async_test]
    async fn reads_are_served_from_memory() {
        let f = fixture();
        let broadcaster = TallyBroadcaster::new(16);
        broadcaster.active_election_changed(&f.backends).await.unwrap();

        // A ballot committed by another instance sharing the ledger.
        f.ledger
            .insert(BallotDraft::example("A", f.position.id, f.alice.id))
            .await
            .unwrap();
        let snapshot = broadcaster.snapshot(&f.backends).await.unwrap().unwrap();
        assert_eq!(snapshot.snapshot.count(f.position.id, f.alice.id), 0);

        // The hook rebuilds from the ledger.
        broadcaster.active_election_changed(&f.backends).await.unwrap();
        let snapshot = broadcaster.snapshot(&f.backends).await.unwrap().unwrap();
        assert_eq!(snapshot.snapshot.count(f.position.id, f.alice.id), 1);
    }

    #[rocket::async_test]
    async fn unannounced_election_switch_is_noticed() {
        let f = fixture();
        let broadcaster = TallyBroadcaster::new(16);
        broadcaster.active_election_changed(&f.backends).await.unwrap();

        let next = Election::current_example();
        f.registry.set_status(f.election.id, ElectionStatus::Closed);
        f.registry.add_election(next.clone());

        let snapshot = broadcaster.snapshot(&f.backends).await.unwrap().unwrap();
        assert_eq!(snapshot.election_id, next.id);
    }
}
