//! Wires one codec registration into a model's lifecycle hooks.
//!
//! # Responsibility
//! - Decode registered attributes after a record is loaded.
//! - Encode them right before a save and restore them right after it.
//!
//! # Invariants
//! - The decode step runs ahead of every `AfterFind` hook already declared,
//!   including inherited ones, and never replaces them.
//! - Decoding clears the attribute's changed flag.
//! - Encoding is all-or-nothing: if any attribute fails, none is rewritten.
//! - The encode hook always continues; only codec errors stop a save.

use crate::codec::AttributeCodec;
use crate::hooks::{HookError, HookOutcome, HookRegistry, HookResult, LifecyclePhase};
use crate::model::class::CodecRegistration;
use crate::model::record::Record;
use log::debug;
use std::sync::Arc;

/// Installs decode, encode and restore hooks for `registration`.
pub fn install(hooks: &mut HookRegistry, registration: &CodecRegistration) {
    let attributes: Arc<[String]> = registration.attributes.clone().into();

    let decode = {
        let attributes = Arc::clone(&attributes);
        let codec = Arc::clone(&registration.codec);
        Arc::new(move |record: &mut Record| decode_attributes(&codec, &attributes, record))
    };
    let encode = {
        let attributes = Arc::clone(&attributes);
        let codec = Arc::clone(&registration.codec);
        Arc::new(move |record: &mut Record| encode_attributes(&codec, &attributes, record))
    };

    hooks
        .chain_mut(LifecyclePhase::AfterFind)
        .push_front(decode.clone());
    hooks.chain_mut(LifecyclePhase::BeforeSave).push_back(encode);
    hooks.chain_mut(LifecyclePhase::AfterSave).push_back(decode);
}

/// Replaces each raw attribute value with its decoded form and clears the
/// attribute's changed flag.
pub fn decode_attributes(
    codec: &AttributeCodec,
    attributes: &[String],
    record: &mut Record,
) -> HookResult {
    for attribute in attributes {
        let decoded = codec
            .decode(record.get(attribute)?)
            .map_err(|source| HookError::Codec {
                attribute: attribute.clone(),
                source,
            })?;
        record.set(attribute, decoded)?;
        record.clear_changed(attribute)?;
    }

    debug!(
        "event=codec_decode module=codec status=ok model={} attributes={}",
        record.class().name(),
        attributes.len()
    );
    Ok(HookOutcome::Continue)
}

/// Replaces each structured attribute value with its encoded form.
pub fn encode_attributes(
    codec: &AttributeCodec,
    attributes: &[String],
    record: &mut Record,
) -> HookResult {
    let mut encoded = Vec::with_capacity(attributes.len());
    for attribute in attributes {
        let raw = codec
            .encode(record.get(attribute)?)
            .map_err(|source| HookError::Codec {
                attribute: attribute.clone(),
                source,
            })?;
        encoded.push((attribute, raw));
    }
    for (attribute, raw) in encoded {
        record.set(attribute, raw)?;
    }

    debug!(
        "event=codec_encode module=codec status=ok model={} attributes={}",
        record.class().name(),
        attributes.len()
    );
    Ok(HookOutcome::Continue)
}
