//! Token and text generation streams.

mod common;

use common::*;
use strata_runtime::abi::{ModelType, Token};
use strata_runtime::{Config, GenerationEngine, Result};

fn scripted(script: &[Token]) -> GenerationEngine<ScriptedBackend> {
    let config = Config {
        sampling: greedy(),
        ..Config::default()
    };
    let backend = ScriptedBackend::new(64).with_script(script);
    let mut e = GenerationEngine::with_config(backend, config);
    e.init("m.bin").unwrap();
    e
}

fn with_stop(mut e: GenerationEngine<ScriptedBackend>, stop: &[&str]) -> GenerationEngine<ScriptedBackend> {
    e.config_mut().stop = stop.iter().map(|s| s.to_string()).collect();
    e
}

#[test]
fn generate_stops_at_eos_without_yielding_it() {
    let mut e = scripted(&[FOO, BAR]);
    let out: Result<Vec<Token>> = e.generate(&[HELLO]).collect();
    assert_eq!(out.unwrap(), vec![FOO, BAR]);

    let evaluated: Vec<Vec<Token>> = e.backend().calls.iter().map(|c| c.tokens.clone()).collect();
    assert_eq!(evaluated, vec![vec![HELLO], vec![FOO], vec![BAR]]);
    assert_eq!(e.history_len(), 3);
}

#[test]
fn generate_honors_max_new_tokens() {
    let mut e = scripted(&[FOO, BAR, BANG]);
    e.config_mut().max_new_tokens = 1;
    let mut stream = e.generate(&[HELLO]);
    assert_eq!(stream.next().unwrap().unwrap(), FOO);
    assert!(stream.next().is_none());
    assert!(stream.next().is_none());
    assert_eq!(stream.produced(), 1);
    drop(stream);
    // The prompt and the yielded token were both evaluated.
    assert_eq!(e.backend().calls.len(), 2);
    assert_eq!(e.history_len(), 2);
}

#[test]
fn continuation_sees_every_yielded_token() {
    let mut e = scripted(&[FOO, BAR, BANG]);
    e.config_mut().reset = false;
    e.config_mut().max_new_tokens = 2;

    let first: Vec<Token> = e.generate(&[HELLO]).map(|t| t.unwrap()).collect();
    assert_eq!(first, vec![FOO, BAR]);
    assert_eq!(e.history_len(), 3);

    let _ = e.generate(&[WORLD]).count();
    let evaluated: Vec<Vec<Token>> = e.backend().calls.iter().map(|c| c.tokens.clone()).collect();
    assert_eq!(evaluated, vec![vec![HELLO], vec![FOO], vec![BAR], vec![WORLD]]);
    assert_eq!(e.backend().calls[3].n_past, 3);
    assert_eq!(e.history_len(), 4);
}

#[test]
fn generate_resets_by_default() {
    let mut e = scripted(&[FOO]);
    e.batch_eval(&[HELLO, WORLD, BANG], 8, 1).unwrap();
    let _ = e.generate(&[HELLO]).count();
    assert_eq!(e.backend().calls[1].n_past, 0);
}

#[test]
fn generate_can_continue_without_reset() {
    let mut e = scripted(&[FOO]);
    e.config_mut().reset = false;
    e.batch_eval(&[HELLO, WORLD, BANG], 8, 1).unwrap();
    let _ = e.generate(&[HELLO]).count();
    assert_eq!(e.backend().calls[1].n_past, 3);
}

#[test]
fn generate_yields_error_once_then_ends() {
    let mut e = scripted(&[FOO, BAR]);
    let mut backend_fail = ScriptedBackend::new(64).with_script(&[FOO, BAR]);
    // Call 0 is the prompt, call 1 the first yielded token.
    backend_fail.fail_at = Some(2);
    let mut failing = GenerationEngine::with_config(backend_fail, e.config().clone());
    failing.init("m.bin").unwrap();

    let mut stream = failing.generate(&[HELLO]);
    assert_eq!(stream.next().unwrap().unwrap(), FOO);
    assert!(stream.next().unwrap().is_err());
    assert!(stream.next().is_none());

    // The healthy engine is unaffected.
    assert_eq!(e.generate(&[HELLO]).count(), 2);
}

#[test]
fn complete_concatenates_pieces() {
    let mut e = scripted(&[FOO, BAR, BANG]);
    assert_eq!(e.complete("Hello").unwrap(), " foo bar!");
}

#[test]
fn dolly_marker_ends_completion() {
    let config = Config {
        sampling: greedy(),
        ..Config::default()
    };
    let mut backend = ScriptedBackend::new(64)
        .with_model_type(ModelType::DollyV2)
        .with_script(&[HELLO, WORLD, END_MARKER, FOO]);
    backend.vocab.add_special_token("### End");
    let mut e = GenerationEngine::with_config(backend, config);
    e.init("dolly.bin").unwrap();
    assert_eq!(e.complete("!").unwrap(), "Hello world");
}

#[test]
fn stop_sequence_truncates_text() {
    let mut e = with_stop(scripted(&[FOO, HASH, HASH, BAR]), &["##"]);
    let chunks: Vec<String> = e.stream("Hello").map(|c| c.unwrap()).collect();
    assert_eq!(chunks, vec![" foo".to_string()]);
}

#[test]
fn partial_stop_is_held_then_released() {
    let mut e = with_stop(scripted(&[FOO, HASH, BAR]), &["#x"]);
    let chunks: Vec<String> = e.stream("Hello").map(|c| c.unwrap()).collect();
    assert_eq!(chunks, vec![" foo".to_string(), "# bar".to_string()]);
}

#[test]
fn partial_stop_completed_later_is_dropped() {
    let mut e = with_stop(scripted(&[HASH, X, BAR]), &["#x"]);
    assert_eq!(e.complete("Hello").unwrap(), "");
}

#[test]
fn held_text_is_flushed_when_generation_ends() {
    let mut e = with_stop(scripted(&[FOO, HASH, BAR]), &["#x"]);
    e.config_mut().max_new_tokens = 2;
    let chunks: Vec<String> = e.stream("Hello").map(|c| c.unwrap()).collect();
    assert_eq!(chunks, vec![" foo".to_string(), "#".to_string()]);
}

#[test]
fn empty_stop_sequences_are_ignored() {
    let mut e = with_stop(scripted(&[FOO, BAR]), &[""]);
    assert_eq!(e.complete("Hello").unwrap(), " foo bar");
}

fn split_e_acute(script: &[Token]) -> GenerationEngine<ScriptedBackend> {
    let config = Config {
        sampling: greedy(),
        ..Config::default()
    };
    let mut backend = ScriptedBackend::new(64).with_script(script);
    backend.vocab.insert(E_HI, vec![0xC3u8]);
    backend.vocab.insert(E_LO, vec![0xA9u8]);
    let mut e = GenerationEngine::with_config(backend, config);
    e.init("m.bin").unwrap();
    e
}

#[test]
fn character_split_across_tokens_is_emitted_whole() {
    let mut e = split_e_acute(&[FOO, E_HI, E_LO, BANG]);
    let chunks: Vec<String> = e.stream("Hello").map(|c| c.unwrap()).collect();
    assert_eq!(chunks, vec![" foo".to_string(), "é".to_string(), "!".to_string()]);
    assert_eq!(e.detokenize_all(&[E_HI, E_LO]), "é");
}

#[test]
fn stop_sequence_matches_split_character() {
    let mut e = with_stop(split_e_acute(&[FOO, E_HI, E_LO, BAR]), &["é"]);
    assert_eq!(e.complete("Hello").unwrap(), " foo");
}

#[test]
fn dangling_lead_byte_is_replaced_at_end() {
    let mut e = split_e_acute(&[FOO, E_HI]);
    assert_eq!(e.complete("Hello").unwrap(), " foo\u{FFFD}");
}

#[test]
fn stream_error_is_reported() {
    let mut backend = ScriptedBackend::new(64).with_script(&[FOO, BAR]);
    backend.fail_at = Some(0);
    let mut e = GenerationEngine::new(backend);
    e.init("m.bin").unwrap();
    assert!(e.complete("Hello").is_err());
}
