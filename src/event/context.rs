use std::sync::Arc;

use tokio::sync::{Notify, RwLock};

use crate::presence::Handle;
use crate::user;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum State {
    Connecting,
    Identified(user::Sub),
    /// Identified and subscribed to at least one room.
    Connected(user::Sub),
    Disconnected,
}

#[derive(Clone)]
pub struct Ws {
    handle: Handle,
    /// Bearer of the token the socket was upgraded with.
    owner: user::Sub,
    state: Arc<RwLock<State>>,
    pub close: Arc<Notify>,
}

impl Ws {
    pub fn new(handle: Handle, owner: user::Sub) -> Self {
        Self {
            handle,
            owner,
            state: Arc::new(RwLock::new(State::Connecting)),
            close: Arc::new(Notify::new()),
        }
    }

    pub const fn handle(&self) -> &Handle {
        &self.handle
    }

    pub const fn owner(&self) -> &user::Sub {
        &self.owner
    }

    pub async fn state(&self) -> State {
        self.state.read().await.clone()
    }

    pub async fn sub(&self) -> Option<user::Sub> {
        match &*self.state.read().await {
            State::Identified(sub) | State::Connected(sub) => Some(sub.clone()),
            State::Connecting | State::Disconnected => None,
        }
    }

    /// Only the first identify on a connection counts.
    pub async fn identify(&self, sub: user::Sub) -> bool {
        let mut state = self.state.write().await;
        match *state {
            State::Connecting => {
                *state = State::Identified(sub);
                true
            }
            _ => false,
        }
    }

    pub async fn join(&self) {
        let mut state = self.state.write().await;
        if let State::Identified(sub) = &*state {
            *state = State::Connected(sub.clone());
        }
    }

    /// Returns the user the connection spoke for, if any.
    pub async fn disconnect(&self) -> Option<user::Sub> {
        let mut state = self.state.write().await;
        match std::mem::replace(&mut *state, State::Disconnected) {
            State::Identified(sub) | State::Connected(sub) => Some(sub),
            State::Connecting | State::Disconnected => None,
        }
    }
}

#[cfg(test)]
mod test {
    use tokio::sync::mpsc;

    use super::*;

    fn ctx() -> Ws {
        let (tx, _rx) = mpsc::unbounded_channel();
        Ws::new(Handle::new(tx), user::Sub::from("jora"))
    }

    #[tokio::test]
    async fn should_walk_through_states() {
        let ctx = ctx();
        let jora = user::Sub::from("jora");
        assert_eq!(ctx.state().await, State::Connecting);

        ctx.join().await;
        assert_eq!(ctx.state().await, State::Connecting);

        assert!(ctx.identify(jora.clone()).await);
        assert_eq!(ctx.state().await, State::Identified(jora.clone()));

        ctx.join().await;
        assert_eq!(ctx.state().await, State::Connected(jora.clone()));

        assert_eq!(ctx.disconnect().await, Some(jora));
        assert_eq!(ctx.state().await, State::Disconnected);
        assert_eq!(ctx.disconnect().await, None);
    }

    #[tokio::test]
    async fn should_ignore_second_identify() {
        let ctx = ctx();

        assert!(ctx.identify(user::Sub::from("jora")).await);
        assert!(!ctx.identify(user::Sub::from("valera")).await);
        assert_eq!(ctx.sub().await, Some(user::Sub::from("jora")));
    }
}
