use crate::error::EngineError;
use crate::models::{Mode, Question};

/// Stable 32-bit hash of the selection key (djb2: h = h * 33 + c, truncated
/// to signed 32 bits, absolute value). Must never change: it is what keeps a
/// learner on the same question set across visits and process restarts
/// without persisting a per-(lesson, mode) assignment.
pub fn stable_hash(key: &str) -> u32 {
    let mut hash: i32 = 5381;
    for ch in key.chars() {
        hash = hash.wrapping_mul(33).wrapping_add(ch as i32);
    }
    hash.unsigned_abs()
}

/// Deterministically pick exactly `count` question ids for a (lesson, mode)
/// pair from the mode's pool. Same pool + same inputs always yields the same
/// ordered list.
///
/// The hash picks a start offset into the pool; the walk is circular and
/// bounded at 2x the pool size, collecting distinct ids. If the pool is
/// smaller than `count`, remaining slots are filled from pool order and, as
/// a last resort, by repeating entries, so the result always has exactly
/// `count` elements.
pub fn pick_question_ids(
    lesson_id: &str,
    mode: Mode,
    count: usize,
    pool: &[Question],
) -> Result<Vec<String>, EngineError> {
    if pool.is_empty() {
        return Err(EngineError::NotFound(format!(
            "no questions found for mode: {}",
            mode
        )));
    }

    let hash = stable_hash(&format!("{}:{}", lesson_id, mode));
    let start_index = hash as usize % pool.len();

    let mut selected: Vec<String> = Vec::with_capacity(count);
    let mut seen = std::collections::HashSet::new();

    let mut index = start_index;
    let mut visited = 0;
    let max_visits = pool.len() * 2;

    while selected.len() < count && visited < max_visits {
        let question = &pool[index];
        if seen.insert(question.id.clone()) {
            selected.push(question.id.clone());
        }
        index = (index + 1) % pool.len();
        visited += 1;
    }

    // Small pools with duplicate ids can leave gaps: fill from pool order
    if selected.len() < count {
        for question in pool {
            if seen.insert(question.id.clone()) {
                selected.push(question.id.clone());
                if selected.len() == count {
                    break;
                }
            }
        }
    }

    // Last resort: repeat entries until the requested length is reached
    while selected.len() < count {
        selected.push(pool[selected.len() % pool.len()].id.clone());
    }

    selected.truncate(count);
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnswerSpec;

    fn pool(mode: Mode, size: usize) -> Vec<Question> {
        (0..size)
            .map(|i| Question {
                id: format!("q-{}-{:02}", mode, i),
                mode,
                prompt: format!("prompt {}", i),
                spec: AnswerSpec::Choice {
                    choices: vec!["a".into(), "b".into()],
                },
                correct_answer: "a".to_string(),
                explanation: None,
                hint: None,
            })
            .collect()
    }

    #[test]
    fn same_inputs_same_output() {
        let pool = pool(Mode::Listening, 25);
        let first = pick_question_ids("lesson-1-1", Mode::Listening, 5, &pool).unwrap();
        let second = pick_question_ids("lesson-1-1", Mode::Listening, 5, &pool).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn distinct_ids_when_pool_is_large_enough() {
        let pool = pool(Mode::Listening, 25);
        let picked = pick_question_ids("lesson-1-1", Mode::Listening, 5, &pool).unwrap();
        let unique: std::collections::HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn different_lessons_get_different_offsets() {
        let pool = pool(Mode::Reading, 25);
        let a = pick_question_ids("lesson-1-1", Mode::Reading, 5, &pool).unwrap();
        let b = pick_question_ids("lesson-1-2", Mode::Reading, 5, &pool).unwrap();
        // Not guaranteed in general, but with this pool size and these keys
        // the offsets differ; the property that matters is each is stable.
        assert_eq!(a, pick_question_ids("lesson-1-1", Mode::Reading, 5, &pool).unwrap());
        assert_eq!(b, pick_question_ids("lesson-1-2", Mode::Reading, 5, &pool).unwrap());
    }

    #[test]
    fn small_pool_fills_with_repeats() {
        let pool = pool(Mode::Writing, 3);
        let picked = pick_question_ids("lesson-1-1", Mode::Writing, 7, &pool).unwrap();
        assert_eq!(picked.len(), 7);
        let unique: std::collections::HashSet<_> = picked.iter().take(3).collect();
        assert_eq!(unique.len(), 3, "first pass covers the whole pool");
    }

    #[test]
    fn exact_length_even_for_single_entry_pool() {
        let pool = pool(Mode::Speaking, 1);
        let picked = pick_question_ids("lesson-9", Mode::Speaking, 5, &pool).unwrap();
        assert_eq!(picked.len(), 5);
        assert!(picked.iter().all(|id| id == "q-speaking-00"));
    }

    #[test]
    fn empty_pool_is_not_found() {
        let err = pick_question_ids("lesson-1-1", Mode::Listening, 5, &[]).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn hash_is_stable_across_calls() {
        let h1 = stable_hash("lesson-1-1:listening");
        let h2 = stable_hash("lesson-1-1:listening");
        assert_eq!(h1, h2);
        assert_ne!(h1, stable_hash("lesson-1-2:listening"));
    }
}
