// src/quiz/randomizer.rs

use rand::{Rng, seq::SliceRandom};

use crate::models::{question::Question, quiz::Quiz};

/// Arranges questions for presentation according to the quiz's shuffle toggles.
///
/// Input is expected in display order, which is kept when shuffling is off.
/// Every call draws a fresh permutation; nothing is persisted, since grading
/// keys answers by option id rather than position.
pub fn arrange<R: Rng + ?Sized>(quiz: &Quiz, mut questions: Vec<Question>, rng: &mut R) -> Vec<Question> {
    if quiz.shuffle_questions {
        questions.shuffle(rng);
    }

    if quiz.shuffle_answers {
        for question in &mut questions {
            if let Some(options) = question.body.options_mut() {
                options.shuffle(rng);
            }
        }
    }

    questions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::test_support::{essay, mcq, quiz};
    use rand::{SeedableRng, rngs::StdRng};

    fn questions(n: i32) -> Vec<Question> {
        (0..n).map(|i| mcq(&format!("q{}", i), i, 1, "a")).collect()
    }

    fn ids(questions: &[Question]) -> Vec<String> {
        questions.iter().map(|q| q.id.clone()).collect()
    }

    #[test]
    fn test_no_shuffle_keeps_display_order() {
        let quiz = quiz(50);
        let mut rng = StdRng::seed_from_u64(7);
        let arranged = arrange(&quiz, questions(10), &mut rng);
        assert_eq!(ids(&arranged), ids(&questions(10)));
        for q in &arranged {
            let option_ids: Vec<&str> = q.body.options().iter().map(|o| o.id.as_str()).collect();
            assert_eq!(option_ids, vec!["a", "b", "c", "d"]);
        }
    }

    #[test]
    fn test_shuffle_questions_is_a_permutation() {
        let mut quiz = quiz(50);
        quiz.shuffle_questions = true;
        let mut rng = StdRng::seed_from_u64(42);

        let arranged = arrange(&quiz, questions(20), &mut rng);
        let mut sorted = ids(&arranged);
        sorted.sort();
        let mut expected = ids(&questions(20));
        expected.sort();
        assert_eq!(sorted, expected);
        assert_ne!(ids(&arranged), ids(&questions(20)));
    }

    #[test]
    fn test_shuffle_answers_only_touches_options() {
        let mut quiz = quiz(50);
        quiz.shuffle_answers = true;
        let mut rng = StdRng::seed_from_u64(3);

        let mut input = questions(30);
        input.push(essay("essay", 30, 5, None));
        let arranged = arrange(&quiz, input.clone(), &mut rng);

        assert_eq!(ids(&arranged), ids(&input));
        let mut any_reordered = false;
        for (before, after) in input.iter().zip(&arranged) {
            let mut a: Vec<_> = before.body.options().to_vec();
            let mut b: Vec<_> = after.body.options().to_vec();
            if a != b {
                any_reordered = true;
            }
            a.sort_by(|x, y| x.id.cmp(&y.id));
            b.sort_by(|x, y| x.id.cmp(&y.id));
            assert_eq!(a, b);
            assert_eq!(before.correct_option(), after.correct_option());
        }
        assert!(any_reordered);
    }
}
