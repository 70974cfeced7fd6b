use anyhow::Result;
use chat_machine::{Flow, Machine, Session, SharedMachine, State};

struct Echo;

impl State for Echo {
    fn on_enter(&self, session: &mut Session) -> Result<Flow> {
        session.add_output(&format!("welcome {}", session.key()));
        Ok(Flow::Continue)
    }

    fn on_update(&self, session: &mut Session) -> Result<Flow> {
        let reply = format!("{}: {}", session.key(), session.input());
        session.add_output(&reply);
        Ok(Flow::Continue)
    }
}

#[tokio::test]
async fn test_concurrent_sessions_through_shared_handle() {
    let shared = SharedMachine::new(Machine::new(Echo));

    let mut handles = Vec::new();
    for n in 0..8 {
        let shared = shared.clone();
        handles.push(tokio::spawn(async move {
            let key = format!("user-{}", n);
            let mut replies = vec![shared.run_turn("hi", &key).await.unwrap()];
            for i in 0..3 {
                replies.push(shared.run_turn(&format!("msg {}", i), &key).await.unwrap());
            }
            (key, replies)
        }));
    }

    for handle in handles {
        let (key, replies) = handle.await.unwrap();
        assert_eq!(replies[0], format!("welcome {}\n", key));
        assert_eq!(replies[3], format!("{}: msg 2\n", key));
    }

    let machine = shared.lock().await;
    assert_eq!(machine.session_count(), 8);
    assert_eq!(machine.session("user-3").unwrap().turns(), 4);
}

#[tokio::test]
async fn test_hooks_can_be_registered_through_the_lock() {
    let shared: SharedMachine = Machine::new(Echo).into();
    shared
        .lock()
        .await
        .set_on_update_hook(|session| session.add_output(">"));

    shared.run_turn("hi", "a").await.unwrap();
    assert_eq!(shared.run_turn("yo", "a").await.unwrap(), ">\na: yo\n");
}
