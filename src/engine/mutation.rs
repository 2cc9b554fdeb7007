use crate::model::*;
use crate::observability;

use super::SimulationEngine;

impl SimulationEngine {
    /// One mutation step against the stored truth. Runs are mutually
    /// exclusive; concurrent reads of the touched day see its pre- or
    /// post-state, never a half-applied record (new record computed under
    /// the write lock, then swapped in whole).
    pub async fn run_auto_mutation(&self) -> MutationEvent {
        let _gate = self.mutation_gate.lock().await;
        let at = now_ms();
        let kind = self.draw_kind();

        let Some(bucket) = self.store().random_populated_bucket(self.rng()) else {
            return self.finish(MutationEvent::noop(at, kind));
        };
        let days = self.store().snapshot_days(&bucket).await;
        if days.is_empty() {
            return self.finish(MutationEvent::noop(at, kind));
        }

        let event = match kind {
            MutationKind::Activate => self.activate(at, &bucket, &days).await,
            MutationKind::Suppress => self.suppress(at, &bucket, &days).await,
            MutationKind::Wipe => self.wipe(at, &bucket, &days).await,
            MutationKind::Restore => self.restore(at, &bucket, &days).await,
        };
        self.finish(event)
    }

    /// Weighted kind draw: Activate 35%, Suppress 30%, Wipe 10%, Restore 25%.
    fn draw_kind(&self) -> MutationKind {
        let r = self.rng().ratio();
        if r < 0.35 {
            MutationKind::Activate
        } else if r < 0.65 {
            MutationKind::Suppress
        } else if r < 0.75 {
            MutationKind::Wipe
        } else {
            MutationKind::Restore
        }
    }

    /// Open 30–70% of a random day's closed slots, in key order.
    async fn activate(
        &self,
        at: Ms,
        bucket: &BucketKey,
        days: &[(DateKey, DayRecord)],
    ) -> MutationEvent {
        let Some(idx) = self.rng().pick_index(days.len()) else {
            return MutationEvent::noop(at, MutationKind::Activate);
        };
        let date = days[idx].0;
        let share = self.rng().range_f64(0.30..0.70);

        let Some(rec) = self.store().day(bucket, date) else {
            return MutationEvent::noop(at, MutationKind::Activate);
        };
        let mut guard = rec.write().await;
        let mut next = guard.clone();

        let closed: Vec<SlotTime> = next
            .slots
            .iter()
            .filter(|(_, s)| **s != SlotStatus::Available)
            .map(|(t, _)| t.clone())
            .collect();
        let count = (closed.len() as f64 * share).floor() as usize;
        let mut activated = 0;
        for time in closed.iter().take(count) {
            next.slots.insert(time.clone(), SlotStatus::Available);
            activated += 1;
        }
        if activated > 0 {
            next.status = DayStatus::Available;
        }
        *guard = next;

        MutationEvent {
            at,
            kind: MutationKind::Activate,
            target: Some((bucket.clone(), date)),
            slots_changed: activated,
        }
    }

    /// Close a random available day outright: every open slot booked, day
    /// flipped to na or full.
    async fn suppress(
        &self,
        at: Ms,
        bucket: &BucketKey,
        days: &[(DateKey, DayRecord)],
    ) -> MutationEvent {
        let eligible: Vec<DateKey> = days
            .iter()
            .filter(|(_, rec)| rec.status == DayStatus::Available)
            .map(|(d, _)| *d)
            .collect();
        let Some(idx) = self.rng().pick_index(eligible.len()) else {
            return MutationEvent::noop(at, MutationKind::Suppress);
        };
        let date = eligible[idx];
        let new_status = if self.rng().chance(0.5) {
            DayStatus::Na
        } else {
            DayStatus::Full
        };

        let Some(rec) = self.store().day(bucket, date) else {
            return MutationEvent::noop(at, MutationKind::Suppress);
        };
        let mut guard = rec.write().await;
        let mut next = guard.clone();

        let mut removed = 0;
        for status in next.slots.values_mut() {
            if *status == SlotStatus::Available {
                *status = SlotStatus::Booked;
                removed += 1;
            }
        }
        next.status = new_status;
        *guard = next;

        MutationEvent {
            at,
            kind: MutationKind::Suppress,
            target: Some((bucket.clone(), date)),
            slots_changed: removed,
        }
    }

    /// Book out every slot of a random day, whatever its state.
    async fn wipe(
        &self,
        at: Ms,
        bucket: &BucketKey,
        days: &[(DateKey, DayRecord)],
    ) -> MutationEvent {
        let Some(idx) = self.rng().pick_index(days.len()) else {
            return MutationEvent::noop(at, MutationKind::Wipe);
        };
        let date = days[idx].0;

        let Some(rec) = self.store().day(bucket, date) else {
            return MutationEvent::noop(at, MutationKind::Wipe);
        };
        let mut guard = rec.write().await;
        let mut next = guard.clone();

        let wiped = next.slots.len();
        for status in next.slots.values_mut() {
            *status = SlotStatus::Booked;
        }
        next.status = DayStatus::Na;
        *guard = next;

        MutationEvent {
            at,
            kind: MutationKind::Wipe,
            target: Some((bucket.clone(), date)),
            slots_changed: wiped,
        }
    }

    /// Reopen a closed (na/full) day: first 50–70% of its slots in key
    /// order become available.
    async fn restore(
        &self,
        at: Ms,
        bucket: &BucketKey,
        days: &[(DateKey, DayRecord)],
    ) -> MutationEvent {
        let eligible: Vec<DateKey> = days
            .iter()
            .filter(|(_, rec)| matches!(rec.status, DayStatus::Na | DayStatus::Full))
            .map(|(d, _)| *d)
            .collect();
        let Some(idx) = self.rng().pick_index(eligible.len()) else {
            return MutationEvent::noop(at, MutationKind::Restore);
        };
        let date = eligible[idx];
        let share = self.rng().range_f64(0.50..0.70);

        let Some(rec) = self.store().day(bucket, date) else {
            return MutationEvent::noop(at, MutationKind::Restore);
        };
        let mut guard = rec.write().await;
        let mut next = guard.clone();

        let count = (next.slots.len() as f64 * share).floor() as usize;
        let times: Vec<SlotTime> = next.slots.keys().take(count).cloned().collect();
        let restored = times.len();
        for time in &times {
            next.slots.insert(time.clone(), SlotStatus::Available);
        }
        if restored > 0 {
            next.status = DayStatus::Available;
        }
        *guard = next;

        MutationEvent {
            at,
            kind: MutationKind::Restore,
            target: Some((bucket.clone(), date)),
            slots_changed: restored,
        }
    }

    fn finish(&self, event: MutationEvent) -> MutationEvent {
        let outcome = if event.target.is_some() { "applied" } else { "noop" };
        metrics::counter!(observability::MUTATIONS_TOTAL,
            "kind" => event.kind.label(), "outcome" => outcome)
        .increment(1);
        if event.target.is_some() {
            metrics::histogram!(observability::MUTATION_SLOTS_CHANGED)
                .record(event.slots_changed as f64);
        }
        self.record_mutation(event.clone());
        event
    }
}
