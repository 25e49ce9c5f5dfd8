// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! deckhand CLI library - exposes the command surface for reuse and tests

pub mod commands;
