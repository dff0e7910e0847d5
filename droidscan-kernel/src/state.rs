use parking_lot::Mutex;
use std::sync::Arc;

/// État partagé entre tâches tokio (verrou court, jamais tenu à travers un `.await`)
pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Copie instantanée de l'état : les lecteurs ne voient jamais une entrée à moitié mise à jour
pub fn snapshot<T: Clone>(state: &Shared<T>) -> T {
    state.lock().clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_is_detached_copy() {
        let state = new_state(vec![1, 2]);
        let copy = snapshot(&state);
        state.lock().push(3);
        assert_eq!(copy, vec![1, 2]);
        assert_eq!(state.lock().len(), 3);
    }
}
