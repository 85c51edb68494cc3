use risk_domain::{validators, DomainError, EventStatus};

// Matriz completa: todo par (from, to) fuera del grafo debe fallar cerrado.
#[test]
fn transition_matrix_is_exhaustive() {
  use EventStatus::*;
  let allowed = [(Received, Validated),
                 (Received, Rejected),
                 (Created, Validated),
                 (Created, Rejected),
                 (Validated, Processing),
                 (Processing, Approved),
                 (Processing, Rejected),
                 (Processing, Failed)];
  for from in EventStatus::ALL {
    for to in EventStatus::ALL {
      let expected = allowed.contains(&(from, to));
      assert_eq!(from.can_transition_to(to), expected, "{} -> {}", from, to);
      let res = validators::validate_status_transition(from, to);
      assert_eq!(res.is_ok(), expected);
      if let Err(DomainError::InvalidStatusTransition { from: f, to: t }) = res {
        assert_eq!((f, t), (from, to));
      }
    }
  }
}

#[test]
fn terminal_states_have_no_exit() {
  for st in [EventStatus::Approved, EventStatus::Rejected, EventStatus::Failed] {
    assert!(st.is_terminal());
  }
  assert!(!EventStatus::Processing.is_terminal());
}
