use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracelens::utils::error::Cancelled;
use tracelens::work::{WorkOutcome, WorkQueue};

fn collect<T: Send + 'static>(
    queue: &mut WorkQueue,
    description: &str,
    background: impl FnOnce(&tracelens::work::CancellationToken) -> anyhow::Result<T> + Send + 'static,
) -> (tracelens::work::WorkHandle, Arc<Mutex<Option<WorkOutcome<T>>>>) {
    let slot = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&slot);
    let handle = queue.start_work(description, background, move |outcome| {
        *sink.lock().unwrap() = Some(outcome);
    });
    (handle, slot)
}

#[test]
fn test_failure_is_marshaled_to_completion() {
    let mut queue = WorkQueue::new(2);
    let (_, slot) = collect::<u32>(&mut queue, "broken parse", |_| {
        Err(anyhow::anyhow!("corrupt header"))
    });
    queue.wait_all();

    match slot.lock().unwrap().take() {
        Some(WorkOutcome::Failed(error)) => assert!(error.to_string().contains("corrupt header")),
        other => panic!("unexpected outcome: {:?}", other),
    };
}

#[test]
fn test_panic_is_marshaled_as_failure() {
    let mut queue = WorkQueue::new(1);
    let (_, slot) = collect::<u32>(&mut queue, "panicking job", |_| panic!("worker bug"));
    queue.wait_all();

    assert!(matches!(slot.lock().unwrap().take(), Some(WorkOutcome::Failed(_))));

    // The pool still accepts work afterwards
    let (_, slot) = collect(&mut queue, "after panic", |_| Ok(7u32));
    queue.wait_all();
    assert!(matches!(slot.lock().unwrap().take(), Some(WorkOutcome::Completed(7))));
}

#[test]
fn test_cancel_running_work() {
    let mut queue = WorkQueue::new(1);
    let (handle, slot) = collect::<()>(&mut queue, "long diff", |token| loop {
        token.check()?;
        thread::sleep(Duration::from_millis(1));
    });
    handle.cancel();
    queue.wait_all();

    let outcome = slot.lock().unwrap().take();
    assert!(matches!(outcome, Some(WorkOutcome::Cancelled)));
    let error = outcome.map(|o| o.into_result().unwrap_err()).unwrap();
    assert!(error.downcast_ref::<Cancelled>().is_some());
}

#[test]
fn test_completions_wait_for_pump() {
    let mut queue = WorkQueue::new(2);
    let (_, slot) = collect(&mut queue, "quick", |_| Ok("done"));

    // Nothing is delivered until the foreground pumps
    thread::sleep(Duration::from_millis(20));
    assert!(slot.lock().unwrap().is_none());
    assert_eq!(queue.pending(), 1);

    queue.wait_all();
    assert!(matches!(slot.lock().unwrap().take(), Some(WorkOutcome::Completed("done"))));
}
