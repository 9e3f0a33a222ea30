#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use matchd_core::{parse_command, Command, JobDescriptor, ShowScope, SweepRequest};
    use tokio::sync::broadcast;

    use crate::batch::{BatchWriter, FileBatchWriter};
    use crate::notice::Notice;
    use crate::runner::Scheduler;
    use crate::testing::{eventually, FakeExecutor};
    use crate::types::{Admission, CancelAllSummary, CancelOutcome, SchedulerConfig};

    fn config(limit: usize) -> SchedulerConfig {
        SchedulerConfig {
            worker_limit: limit,
            poll_interval: Duration::from_millis(5),
            ..SchedulerConfig::default()
        }
    }

    fn scheduler(limit: usize, exec: &FakeExecutor) -> Scheduler {
        Scheduler::new(config(limit), Arc::new(exec.clone()), None)
    }

    fn job(line: &str) -> JobDescriptor {
        match parse_command(line).unwrap() {
            Command::Submit(d) => d,
            other => panic!("expected a job, got {other:?}"),
        }
    }

    fn sweep(line: &str) -> SweepRequest {
        match parse_command(line).unwrap() {
            Command::Sweep(req) => req,
            other => panic!("expected a sweep, got {other:?}"),
        }
    }

    async fn next_notices(rx: &mut broadcast::Receiver<Notice>, n: usize) -> Vec<Notice> {
        let mut out = Vec::new();
        for _ in 0..n {
            let notice = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("timed out waiting for notice")
                .expect("notice channel closed");
            out.push(notice);
        }
        out
    }

    async fn saw_notice(rx: &mut broadcast::Receiver<Notice>, wanted: &Notice) -> bool {
        loop {
            match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
                Ok(Ok(n)) if &n == wanted => return true,
                Ok(Ok(_)) => continue,
                _ => return false,
            }
        }
    }

    #[tokio::test]
    async fn ninth_job_queues_then_takes_freed_slot() {
        let exec = FakeExecutor::manual();
        let sched = scheduler(8, &exec);

        for i in 1..=8 {
            let admission = sched.admit(job(&format!("sleep {i}"))).unwrap();
            assert_eq!(admission, Admission::Started { slot: i });
        }
        assert_eq!(sched.admit(job("sleep 9")).unwrap(), Admission::Queued { position: 1 });
        assert_eq!(sched.active_count(), 8);
        assert_eq!(sched.pending_count(), 1);
        assert!(eventually(|| exec.running_commands().len() == 8).await);

        assert!(exec.finish("sleep 3", 0));
        assert!(eventually(|| sched.active_slots().contains(&(3, "sleep 9".to_string()))).await);
        assert_eq!(sched.active_count(), 8);
        assert_eq!(sched.pending_count(), 0);
    }

    #[tokio::test]
    async fn freed_middle_slot_is_reused_first() {
        let exec = FakeExecutor::manual();
        let sched = scheduler(4, &exec);
        for i in 1..=3 {
            sched.admit(job(&format!("sleep {i}"))).unwrap();
        }
        assert!(eventually(|| exec.running_commands().len() == 3).await);
        exec.finish("sleep 2", 0);
        assert!(eventually(|| sched.active_count() == 2).await);

        assert_eq!(sched.admit(job("sleep 7")).unwrap(), Admission::Started { slot: 2 });
        assert_eq!(sched.admit(job("sleep 8")).unwrap(), Admission::Started { slot: 4 });
    }

    #[tokio::test]
    async fn queued_jobs_are_admitted_in_arrival_order() {
        let exec = FakeExecutor::manual();
        let sched = scheduler(1, &exec);
        sched.admit(job("sleep 1")).unwrap();
        assert_eq!(sched.admit(job("sleep 2")).unwrap(), Admission::Queued { position: 1 });
        assert_eq!(sched.admit(job("sleep 3")).unwrap(), Admission::Queued { position: 2 });
        assert!(eventually(|| exec.running_commands() == ["sleep 1"]).await);

        exec.finish("sleep 1", 0);
        assert!(eventually(|| exec.running_commands() == ["sleep 2"]).await);
        exec.finish("sleep 2", 0);
        assert!(eventually(|| exec.running_commands() == ["sleep 3"]).await);
        assert_eq!(exec.spawned_commands(), ["sleep 1", "sleep 2", "sleep 3"]);
    }

    #[tokio::test]
    async fn notices_follow_job_lifecycle() {
        let exec = FakeExecutor::manual();
        let sched = scheduler(1, &exec);
        let mut rx = sched.subscribe();

        sched.admit(job("sleep 1")).unwrap();
        sched.admit(job("sleep 2")).unwrap();
        assert!(eventually(|| exec.running_commands().len() == 1).await);
        exec.finish("sleep 1", 0);
        assert!(eventually(|| exec.running_commands() == ["sleep 2"]).await);
        exec.finish("sleep 2", 1);

        assert_eq!(
            next_notices(&mut rx, 5).await,
            [
                Notice::Started { slot: 1, command: "sleep 1".into() },
                Notice::Queued { position: 1, command: "sleep 2".into() },
                Notice::Completed { slot: 1, command: "sleep 1".into() },
                Notice::Started { slot: 1, command: "sleep 2".into() },
                Notice::Failed {
                    slot: 1,
                    command: "sleep 2".into(),
                    reason: "sleep stage exited with status 1".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn canceled_queued_job_never_runs() {
        let exec = FakeExecutor::manual();
        let sched = scheduler(1, &exec);
        sched.admit(job("sleep 1")).unwrap();
        sched.admit(job("sleep 2")).unwrap();
        sched.admit(job("sleep 3")).unwrap();

        assert_eq!(sched.cancel_match("sleep 2"), CancelOutcome::Queued);
        assert_eq!(sched.show(ShowScope::Queue), ["sleep 3"]);

        assert!(eventually(|| exec.running_commands().len() == 1).await);
        exec.finish("sleep 1", 0);
        assert!(eventually(|| exec.running_commands() == ["sleep 3"]).await);
        assert!(!exec.spawned_commands().contains(&"sleep 2".to_string()));
    }

    #[tokio::test]
    async fn cancel_removes_only_first_duplicate() {
        let exec = FakeExecutor::manual();
        let sched = scheduler(1, &exec);
        sched.admit(job("sleep 1")).unwrap();
        sched.admit(job("sleep 5")).unwrap();
        sched.admit(job("sleep 5")).unwrap();
        assert_eq!(sched.cancel_match("sleep 5"), CancelOutcome::Queued);
        assert_eq!(sched.show(ShowScope::Queue), ["sleep 5"]);
        assert_eq!(sched.cancel_match("sleep 42"), CancelOutcome::NotFound);
    }

    #[tokio::test]
    async fn canceled_active_job_is_terminated_and_slot_freed() {
        let exec = FakeExecutor::manual();
        let sched = scheduler(2, &exec);
        let mut rx = sched.subscribe();
        sched.admit(job("sleep 1")).unwrap();
        assert!(eventually(|| exec.running_commands().len() == 1).await);

        assert_eq!(sched.cancel_match("sleep 1"), CancelOutcome::Active { slot: 1 });
        assert!(eventually(|| sched.active_count() == 0).await);
        assert_eq!(exec.terminated_commands(), ["sleep 1"]);
        assert!(saw_notice(&mut rx, &Notice::Canceled { slot: 1, command: "sleep 1".into() }).await);
    }

    #[tokio::test]
    async fn active_match_wins_over_queued_duplicate() {
        let exec = FakeExecutor::manual();
        let sched = scheduler(1, &exec);
        sched.admit(job("sleep 1")).unwrap();
        sched.admit(job("sleep 1")).unwrap();
        assert_eq!(sched.cancel_match("sleep 1"), CancelOutcome::Active { slot: 1 });
        assert_eq!(sched.pending_count(), 1);
    }

    #[tokio::test]
    async fn repeated_cancel_reaches_each_identical_active_job() {
        let exec = FakeExecutor::manual();
        let sched = scheduler(3, &exec);
        sched.admit(job("sleep 5")).unwrap();
        sched.admit(job("sleep 5")).unwrap();
        assert!(eventually(|| exec.running_commands().len() == 2).await);

        assert_eq!(sched.cancel_match("sleep 5"), CancelOutcome::Active { slot: 1 });
        assert_eq!(sched.cancel_match("sleep 5"), CancelOutcome::Active { slot: 2 });
        assert!(eventually(|| sched.active_count() == 0).await);
        assert_eq!(exec.terminated_commands(), ["sleep 5", "sleep 5"]);
    }

    #[tokio::test]
    async fn panicking_runner_still_frees_its_slot() {
        let exec = FakeExecutor::manual();
        exec.panic_on("sleep 1");
        let sched = scheduler(1, &exec);
        let mut rx = sched.subscribe();

        assert_eq!(sched.admit(job("sleep 1")).unwrap(), Admission::Started { slot: 1 });
        sched.admit(job("sleep 2")).unwrap();

        assert!(eventually(|| exec.running_commands() == ["sleep 2"]).await);
        assert_eq!(sched.active_slots(), [(1, "sleep 2".to_string())]);
        let failed = loop {
            match next_notices(&mut rx, 1).await.remove(0) {
                Notice::Failed { slot, command, reason } => break (slot, command, reason),
                _ => continue,
            }
        };
        assert_eq!((failed.0, failed.1.as_str()), (1, "sleep 1"));
        assert!(failed.2.starts_with("pipeline runner aborted"));
    }

    #[tokio::test]
    async fn new_job_waits_behind_queued_sweep() {
        let exec = FakeExecutor::manual();
        let sched = scheduler(3, &exec);
        let req = sweep("calcsfh /w/param /w/phot /w/fake /w/fit -dAvrange=0.0,1.0,0.2 > /w/fit.out");
        assert_eq!(sched.submit_sweep(&req).unwrap(), 6);

        // Slots are still free: the reaper has not run the refill yet.
        assert_eq!(sched.admit(job("sleep 9")).unwrap(), Admission::Queued { position: 7 });
        assert!(eventually(|| sched.active_count() == 3).await);
        let threads = sched.show(ShowScope::Threads);
        assert!(threads.iter().all(|t| t.contains("-dAv=")));
        assert_eq!(sched.show(ShowScope::Queue).last().map(String::as_str), Some("sleep 9"));
    }

    #[tokio::test]
    async fn show_is_read_only_and_ordered() {
        let exec = FakeExecutor::manual();
        let sched = scheduler(2, &exec);
        assert_eq!(sched.show(ShowScope::All), ["no commands to show"]);
        assert_eq!(sched.show(ShowScope::Queue), ["no queued commands"]);
        assert_eq!(sched.show(ShowScope::Threads), ["no current threads running"]);

        for i in 1..=4 {
            sched.admit(job(&format!("sleep {i}"))).unwrap();
        }
        let first = sched.show(ShowScope::Queue);
        let second = sched.show(ShowScope::Queue);
        assert_eq!(first, second);
        assert_eq!(first, ["sleep 3", "sleep 4"]);
        assert_eq!(sched.show(ShowScope::Threads), ["sleep 1", "sleep 2"]);
        assert_eq!(sched.show(ShowScope::All), ["sleep 3", "sleep 4", "sleep 1", "sleep 2"]);
        assert_eq!(sched.pending_count(), 2);
    }

    #[tokio::test]
    async fn cancel_all_clears_queue_and_stops_runners() {
        let exec = FakeExecutor::manual();
        let sched = scheduler(2, &exec);
        for i in 1..=5 {
            sched.admit(job(&format!("sleep {i}"))).unwrap();
        }
        assert!(eventually(|| exec.running_commands().len() == 2).await);

        let summary = sched.cancel_all();
        assert_eq!(summary, CancelAllSummary { queued_removed: 3, active_marked: 2 });
        assert_eq!(sched.show(ShowScope::Queue), ["no queued commands"]);

        assert!(eventually(|| sched.active_count() == 0).await);
        assert_eq!(sched.show(ShowScope::All), ["no commands to show"]);
        assert_eq!(exec.spawned_commands(), ["sleep 1", "sleep 2"]);
        assert_eq!(exec.terminated_commands().len(), 2);
    }

    #[tokio::test]
    async fn sweep_fills_free_slots_in_one_burst() {
        let exec = FakeExecutor::manual();
        let sched = scheduler(3, &exec);
        let mut rx = sched.subscribe();
        sched.admit(job("sleep 1")).unwrap();

        let req = sweep("calcsfh /w/param /w/phot /w/fake /w/fit -dAvrange=0.0,1.0,0.2 > /w/fit.out");
        assert_eq!(sched.submit_sweep(&req).unwrap(), 6);

        assert!(eventually(|| sched.active_count() == 3).await);
        assert_eq!(sched.pending_count(), 4);
        let threads = sched.show(ShowScope::Threads);
        assert_eq!(threads[0], "sleep 1");
        assert!(threads[1].contains("-dAv=0.000"));
        assert!(threads[2].contains("-dAv=0.200"));
        let expected = Notice::SweepQueued { count: 6, command: req.original_command.clone() };
        assert!(saw_notice(&mut rx, &expected).await);
    }

    #[tokio::test]
    async fn sweep_drains_through_single_refills() {
        let exec = FakeExecutor::auto();
        let sched = scheduler(2, &exec);
        let req = sweep("calcsfh p ph f fit -dAvrange=0.0,0.4,0.1");
        sched.submit_sweep(&req).unwrap();
        assert!(eventually(|| sched.active_count() == 0 && sched.pending_count() == 0).await);

        let primaries: Vec<String> = exec
            .spawned_commands()
            .into_iter()
            .filter(|c| c.starts_with("calcsfh"))
            .collect();
        assert_eq!(primaries.len(), 5);
        assert!(primaries.iter().any(|c| c.contains("fit_dAv_0-40 -dAv=0.400")));
    }

    #[tokio::test]
    async fn grouped_job_goes_to_batch_file_without_slot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("condor.jobs");
        let writer: Arc<dyn BatchWriter> = Arc::new(FileBatchWriter::open(&path, 10).unwrap());
        let exec = FakeExecutor::manual();
        let cfg = SchedulerConfig { batch_enabled: true, ..config(1) };
        let sched = Scheduler::new(cfg, Arc::new(exec.clone()), Some(writer));

        let line = "calcsfh /w/param /w/phot /w/fake /w/fit -group=m83 > /w/fit.out";
        assert_eq!(sched.admit(job(line)).unwrap(), Admission::Batched { group: "m83".into() });
        assert_eq!(sched.active_count(), 0);
        assert!(exec.spawned().is_empty());

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("calcsfh /w/param /w/phot /w/fake /w/fit > /w/fit.out | "));
        assert!(text.trim_end().ends_with(&format!("group m83 {line}")));
    }

    #[tokio::test]
    async fn grouped_job_runs_locally_when_batch_disabled() {
        let exec = FakeExecutor::manual();
        let sched = scheduler(1, &exec);
        let admission = sched.admit(job("calcsfh /w/p /w/ph /w/f /w/fit -group=m83 > /w/fit.out")).unwrap();
        assert_eq!(admission, Admission::Started { slot: 1 });
        assert!(eventually(|| exec.spawned().len() == 1).await);
        assert!(!exec.spawned_commands()[0].contains("-group"));
    }

    #[tokio::test]
    async fn shutdown_cancels_and_stops_redispatch() {
        let exec = FakeExecutor::manual();
        let sched = scheduler(1, &exec);
        sched.admit(job("sleep 1")).unwrap();
        sched.admit(job("sleep 2")).unwrap();
        assert!(eventually(|| exec.running_commands().len() == 1).await);

        sched.shutdown(Duration::from_secs(2)).await;
        assert!(sched.is_shutting_down());
        assert_eq!(sched.active_count(), 0);
        assert_eq!(exec.spawned_commands(), ["sleep 1"]);
    }
}
