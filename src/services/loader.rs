use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::core::time::parse_timestamp;
use crate::exam::models::{QuestionOption, TestDefinition, TestQuestion};
use crate::exam::types::QuestionKind;
use crate::schemas::upstream::{OptionDto, QuestionDto, TestDto};

/// Turns a raw exam-bank payload into a [`TestDefinition`] and, when the
/// test asks for it, shuffles the question order. This is the only place
/// option ids are synthesized or kinds inferred; after it, both are fixed
/// facts.
pub(crate) fn prepare_session_test(dto: TestDto) -> TestDefinition {
    let mut test = normalize_test(dto);
    if test.randomize_questions {
        let mut rng = StdRng::seed_from_u64(rand::random::<u64>());
        shuffle_questions(&mut test, &mut rng);
    }
    test
}

pub(crate) fn normalize_test(dto: TestDto) -> TestDefinition {
    TestDefinition {
        id: dto.id,
        name: dto.name,
        duration_minutes: dto.duration,
        total_score: dto.score,
        max_retake: dto.max_retake,
        randomize_questions: dto.randomize_questions,
        enable_anti_cheat: dto.enable_anti_cheat,
        enable_tab_warning: dto.enable_tab_warning,
        show_answer_after_submit: dto.show_answer_after_submit,
        open_time: dto.open_time.as_deref().and_then(parse_timestamp),
        close_time: dto.close_time.as_deref().and_then(parse_timestamp),
        questions: dto.questions.into_iter().map(normalize_question).collect(),
    }
}

pub(crate) fn shuffle_questions<R: Rng>(test: &mut TestDefinition, rng: &mut R) {
    test.questions.shuffle(rng);
}

fn normalize_question(dto: QuestionDto) -> TestQuestion {
    let kind = resolve_kind(dto.kind.as_deref(), &dto.options);
    let options = dto
        .options
        .into_iter()
        .enumerate()
        .map(|(index, option)| QuestionOption {
            id: option
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| format!("opt_{index}")),
            text: option.text,
            correct: option.is_correct,
        })
        .collect();

    TestQuestion {
        id: dto.id,
        content: dto.content,
        kind,
        level: dto.level.unwrap_or_else(|| "unknown".to_string()),
        options,
        free_answer: dto.answer,
    }
}

/// Explicit type strings win; without one, more than one correct option
/// means multiple choice.
fn resolve_kind(raw: Option<&str>, options: &[OptionDto]) -> QuestionKind {
    match raw.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
        Some("multiple_choice") | Some("multiple") => QuestionKind::MultipleChoice,
        Some("true_false") | Some("truefalse") => QuestionKind::TrueFalse,
        Some("single_choice") | Some("single") => QuestionKind::SingleChoice,
        _ => {
            let correct = options.iter().filter(|option| option.is_correct).count();
            if correct > 1 {
                QuestionKind::MultipleChoice
            } else {
                QuestionKind::SingleChoice
            }
        }
    }
}
