//! Script execution engine
//!
//! A locking script is an ordered list of [`ScriptElement`]s. Execution seeds a
//! [`Stack`] from the unlocking witness (bottom to top), applies each element of
//! the locking script left to right and reduces to a [`Verdict`]:
//!
//! 1. Initialize stack S from the witness
//! 2. For each element e in the script:
//!    - data: push it
//!    - opcode: check |S| against the opcode's arity, apply it
//!    - a failed gate stops execution immediately
//! 3. Pass iff the top of S is true
//!
//! Stack underflows and limit breaches are [`StructuralError`]s; a mismatched
//! hash or a rejected signature is a [`VerificationFailure`]. Both come back as
//! `Ok(Verdict::Fail(..))`. Only an unusable signature primitive is an `Err`.

use crate::config::VerifierConfig;
use crate::constants::{HASH160_SIZE, MAX_DIRECT_PUSH, MAX_SCRIPT_ELEMENT_SIZE};
use crate::crypto::{hash160, hash_eq};
use crate::error::{Result, VerifyError};
use crate::multisig::count_valid_signatures;
use crate::opcodes::{Opcode, OP_PUSHDATA1, OP_PUSHDATA2};
use crate::signature::SignatureChecker;
use crate::types::{
    ByteString, FailureReason, MultisigPolicy, ScriptOutcome, StructuralError, TraceStep,
    VerificationFailure, Verdict,
};
use std::fmt;
use tracing::{debug, trace, Level};

// ============================================================================
// SCRIPT
// ============================================================================

/// One element of a script: an opcode or a data push
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScriptElement {
    Op(Opcode),
    Push(ByteString),
}

impl ScriptElement {
    /// Data push, with the empty push folded into `OP_0`
    pub fn data(data: impl Into<ByteString>) -> Self {
        let data = data.into();
        if data.is_empty() {
            ScriptElement::Op(Opcode::Op0)
        } else {
            ScriptElement::Push(data)
        }
    }

    fn label(&self) -> String {
        match self {
            ScriptElement::Op(op) => op.name().to_string(),
            ScriptElement::Push(_) => "PUSH".to_string(),
        }
    }
}

/// Locking or unlocking script
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Script {
    elements: Vec<ScriptElement>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_elements(elements: Vec<ScriptElement>) -> Self {
        Self { elements }
    }

    pub fn push_opcode(mut self, op: Opcode) -> Self {
        self.elements.push(ScriptElement::Op(op));
        self
    }

    /// Append a data push. An empty push is stored as `OP_0`, which is what it
    /// serializes to.
    pub fn push_data(mut self, data: impl Into<ByteString>) -> Self {
        self.elements.push(ScriptElement::data(data));
        self
    }

    /// `OP_DUP OP_HASH160 <pubKeyHash> OP_EQUALVERIFY OP_CHECKSIG`
    pub fn p2pkh(pubkey_hash: &[u8]) -> Self {
        Self::new()
            .push_opcode(Opcode::Dup)
            .push_opcode(Opcode::Hash160)
            .push_data(pubkey_hash.to_vec())
            .push_opcode(Opcode::EqualVerify)
            .push_opcode(Opcode::CheckSig)
    }

    /// `<signature> <pubKey>`
    pub fn p2pkh_unlock(signature: &[u8], public_key: &[u8]) -> Self {
        Self::new()
            .push_data(signature.to_vec())
            .push_data(public_key.to_vec())
    }

    /// `OP_m <pubKey1> ... <pubKeyN> OP_n OP_CHECKMULTISIG`
    pub fn multisig(policy: &MultisigPolicy) -> Result<Self> {
        let mut script = Self::new().push_opcode(small_int_opcode(policy.required_sigs())?);
        for key in policy.public_keys() {
            script = script.push_data(key.clone());
        }
        Ok(script
            .push_opcode(small_int_opcode(policy.public_keys().len())?)
            .push_opcode(Opcode::CheckMultiSig))
    }

    /// `<sig1> ... <sigM>`, in public-key order
    pub fn multisig_unlock<S: AsRef<[u8]>>(signatures: &[S]) -> Self {
        signatures
            .iter()
            .fold(Self::new(), |script, sig| script.push_data(sig.as_ref().to_vec()))
    }

    pub fn elements(&self) -> &[ScriptElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// True if the script contains only data pushes and small-integer pushes
    pub fn is_push_only(&self) -> bool {
        self.elements.iter().all(|e| {
            matches!(
                e,
                ScriptElement::Push(_) | ScriptElement::Op(Opcode::Op0 | Opcode::Num(_))
            )
        })
    }

    pub fn is_p2pkh(&self) -> bool {
        matches!(
            self.elements.as_slice(),
            [
                ScriptElement::Op(Opcode::Dup),
                ScriptElement::Op(Opcode::Hash160),
                ScriptElement::Push(hash),
                ScriptElement::Op(Opcode::EqualVerify),
                ScriptElement::Op(Opcode::CheckSig),
            ] if hash.len() == HASH160_SIZE
        )
    }

    /// Embedded public-key hash of a P2PKH script
    pub fn p2pkh_hash(&self) -> Option<&[u8]> {
        if !self.is_p2pkh() {
            return None;
        }
        match &self.elements[2] {
            ScriptElement::Push(hash) => Some(hash),
            ScriptElement::Op(_) => None,
        }
    }

    /// Decode serialized script bytes.
    ///
    /// Direct pushes (1-75 bytes), OP_PUSHDATA1 and OP_PUSHDATA2 carry data;
    /// every other byte must be a supported opcode.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut elements = Vec::new();
        let mut pc = 0usize;

        while pc < bytes.len() {
            let byte = bytes[pc];
            pc += 1;

            let len = match byte {
                0x01..=0x4b => byte as usize,
                OP_PUSHDATA1 => {
                    let len = *bytes
                        .get(pc)
                        .ok_or_else(|| malformed("missing OP_PUSHDATA1 length"))?
                        as usize;
                    pc += 1;
                    len
                }
                OP_PUSHDATA2 => {
                    let raw = bytes
                        .get(pc..pc + 2)
                        .ok_or_else(|| malformed("missing OP_PUSHDATA2 length"))?;
                    pc += 2;
                    u16::from_le_bytes([raw[0], raw[1]]) as usize
                }
                _ => {
                    elements.push(ScriptElement::Op(Opcode::try_from(byte)?));
                    continue;
                }
            };

            if len > MAX_SCRIPT_ELEMENT_SIZE {
                return Err(malformed("push exceeds maximum element size"));
            }
            let data = bytes
                .get(pc..pc + len)
                .ok_or_else(|| malformed("push data runs past end of script"))?;
            elements.push(ScriptElement::data(data));
            pc += len;
        }

        Ok(Self { elements })
    }

    /// Serialize with the shortest push encoding.
    ///
    /// Pushes longer than [`MAX_SCRIPT_ELEMENT_SIZE`] are rejected, since
    /// `from_bytes` would refuse them. A `Push` of no bytes built through
    /// `from_elements` is written as `OP_0`.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for element in &self.elements {
            match element {
                ScriptElement::Op(op) => out.push(op.to_byte()),
                ScriptElement::Push(data) => {
                    let len = data.len();
                    if len > MAX_SCRIPT_ELEMENT_SIZE {
                        return Err(malformed(format!(
                            "push of {len} bytes exceeds maximum element size"
                        )));
                    }
                    if len == 0 {
                        out.push(Opcode::Op0.to_byte());
                    } else if len <= MAX_DIRECT_PUSH {
                        out.push(len as u8);
                    } else if len <= 0xff {
                        out.push(OP_PUSHDATA1);
                        out.push(len as u8);
                    } else {
                        out.push(OP_PUSHDATA2);
                        out.extend_from_slice(&(len as u16).to_le_bytes());
                    }
                    out.extend_from_slice(data);
                }
            }
        }
        Ok(out)
    }

    /// Parse the ASM form produced by `Display`: opcode names and `<hex>` data.
    /// Bare hex tokens are accepted as data too.
    pub fn from_asm(asm: &str) -> Result<Self> {
        let mut elements = Vec::new();
        for token in asm.split_whitespace() {
            if let Some(op) = Opcode::from_name(token) {
                elements.push(ScriptElement::Op(op));
                continue;
            }
            let hex_str = token
                .strip_prefix('<')
                .and_then(|t| t.strip_suffix('>'))
                .unwrap_or(token);
            let data = hex::decode(hex_str)
                .map_err(|_| malformed(format!("unknown token `{token}`")))?;
            elements.push(ScriptElement::data(data));
        }
        Ok(Self { elements })
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match element {
                ScriptElement::Op(op) => write!(f, "{op}")?,
                ScriptElement::Push(data) => write!(f, "<{}>", hex::encode(data))?,
            }
        }
        Ok(())
    }
}

fn malformed(msg: impl Into<std::borrow::Cow<'static, str>>) -> VerifyError {
    VerifyError::MalformedScript(msg.into())
}

fn small_int_opcode(n: usize) -> Result<Opcode> {
    u8::try_from(n)
        .ok()
        .and_then(Opcode::from_small_int)
        .ok_or_else(|| VerifyError::InvalidPolicy(format!("{n} does not fit OP_0..OP_16").into()))
}

// ============================================================================
// STACK
// ============================================================================

/// Execution stack, owned by exactly one verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    items: Vec<ByteString>,
    limit: usize,
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

impl Stack {
    pub fn new() -> Self {
        Self::with_limit(crate::constants::MAX_STACK_SIZE)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            items: Vec::with_capacity(limit.min(20)),
            limit,
        }
    }

    /// Stack holding `items`, first element at the bottom
    pub fn from_items(items: Vec<ByteString>) -> Self {
        let mut stack = Self::new();
        stack.items = items;
        stack
    }

    pub fn depth(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn top(&self) -> Option<&ByteString> {
        self.items.last()
    }

    /// Items bottom to top
    pub fn items(&self) -> &[ByteString] {
        &self.items
    }

    pub fn push(&mut self, item: ByteString) -> std::result::Result<(), StructuralError> {
        if self.items.len() >= self.limit {
            return Err(StructuralError::StackOverflow { limit: self.limit });
        }
        self.items.push(item);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<ByteString> {
        self.items.pop()
    }

    fn require(&self, op: Opcode, required: usize) -> std::result::Result<(), StructuralError> {
        if self.items.len() < required {
            return Err(StructuralError::StackUnderflow {
                opcode: op.name().to_string(),
                required,
                depth: self.items.len(),
            });
        }
        Ok(())
    }

    /// Pop after a successful `require`
    fn pop_for(&mut self, op: Opcode) -> std::result::Result<ByteString, StructuralError> {
        self.items.pop().ok_or_else(|| StructuralError::StackUnderflow {
            opcode: op.name().to_string(),
            required: 1,
            depth: 0,
        })
    }

    fn render(&self) -> Vec<String> {
        self.items.iter().map(hex::encode).collect()
    }
}

/// Script truthiness: any non-zero byte, except negative zero
pub fn is_true(item: &[u8]) -> bool {
    for (i, &byte) in item.iter().enumerate() {
        if byte != 0 {
            return !(i == item.len() - 1 && byte == 0x80);
        }
    }
    false
}

fn encode_bool(value: bool) -> ByteString {
    if value {
        vec![1]
    } else {
        vec![0]
    }
}

// ============================================================================
// INTERPRETER
// ============================================================================

/// Per-call execution options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOptions {
    pub max_stack_size: usize,
    pub max_script_ops: usize,
    pub max_pubkeys_per_multisig: usize,
    /// Collect a [`TraceStep`] per executed element
    pub record_trace: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self::from_config(&VerifierConfig::default())
    }
}

impl ExecOptions {
    pub fn from_config(config: &VerifierConfig) -> Self {
        Self {
            max_stack_size: config.limits.max_stack_size,
            max_script_ops: config.limits.max_script_ops,
            max_pubkeys_per_multisig: config.limits.max_pubkeys_per_multisig,
            record_trace: config.debug.trace_execution,
        }
    }

    pub fn with_trace(mut self, record_trace: bool) -> Self {
        self.record_trace = record_trace;
        self
    }
}

/// Why execution stopped early
enum Halt {
    Fail(FailureReason),
    Environment(VerifyError),
}

impl From<StructuralError> for Halt {
    fn from(e: StructuralError) -> Self {
        Halt::Fail(e.into())
    }
}

impl From<VerificationFailure> for Halt {
    fn from(e: VerificationFailure) -> Self {
        Halt::Fail(e.into())
    }
}

impl From<VerifyError> for Halt {
    fn from(e: VerifyError) -> Self {
        Halt::Environment(e)
    }
}

type Step = std::result::Result<(), Halt>;

/// Stack machine over one or more scripts sharing a stack
pub struct Interpreter<'a> {
    checker: &'a dyn SignatureChecker,
    options: ExecOptions,
    op_count: usize,
    /// Failure to report if the last opcode left false on top
    pending_failure: Option<VerificationFailure>,
    trace: Vec<TraceStep>,
}

impl<'a> Interpreter<'a> {
    pub fn new(checker: &'a dyn SignatureChecker, options: ExecOptions) -> Self {
        Self {
            checker,
            options,
            op_count: 0,
            pending_failure: None,
            trace: Vec::new(),
        }
    }

    /// Run `script` on `stack`. `Ok(None)` means every gate passed.
    pub fn execute(&mut self, script: &Script, stack: &mut Stack) -> Result<Option<FailureReason>> {
        stack.limit = self.options.max_stack_size;
        for element in script.elements() {
            let render = self.options.record_trace || tracing::enabled!(Level::TRACE);
            let before = render.then(|| stack.render());

            let step = self.step(element, stack);

            if let Some(stack_before) = before {
                let stack_after = stack.render();
                trace!(
                    opcode = %element.label(),
                    stack_before = ?stack_before,
                    stack_after = ?stack_after,
                    "script element applied"
                );
                if self.options.record_trace {
                    self.trace.push(TraceStep {
                        element: element.label(),
                        stack_before,
                        stack_after,
                    });
                }
            }

            match step {
                Ok(()) => {}
                Err(Halt::Fail(reason)) => {
                    debug!(%reason, element = %element.label(), "script execution halted");
                    return Ok(Some(reason));
                }
                Err(Halt::Environment(e)) => {
                    tracing::warn!(error = %e, "signature primitive unavailable");
                    return Err(e);
                }
            }
        }
        Ok(None)
    }

    /// Final verdict from the stack top
    pub fn conclude(&self, stack: &Stack) -> Verdict {
        match stack.top() {
            None => Verdict::Fail(StructuralError::EmptyStack.into()),
            Some(top) if is_true(top) => Verdict::Pass,
            Some(_) => Verdict::Fail(
                self.pending_failure
                    .clone()
                    .unwrap_or(VerificationFailure::FalseResult)
                    .into(),
            ),
        }
    }

    pub fn into_trace(self) -> Vec<TraceStep> {
        self.trace
    }

    fn step(&mut self, element: &ScriptElement, stack: &mut Stack) -> Step {
        self.pending_failure = None;
        match element {
            ScriptElement::Push(data) => {
                stack.push(data.clone())?;
                Ok(())
            }
            ScriptElement::Op(op) => {
                if !matches!(op, Opcode::Op0 | Opcode::Num(_)) {
                    self.op_count += 1;
                    if self.op_count > self.options.max_script_ops {
                        return Err(StructuralError::OpCountExceeded {
                            limit: self.options.max_script_ops,
                        }
                        .into());
                    }
                }
                stack.require(*op, op.required_depth())?;
                self.execute_opcode(*op, stack)
            }
        }
    }

    fn execute_opcode(&mut self, op: Opcode, stack: &mut Stack) -> Step {
        match op {
            Opcode::Op0 => stack.push(vec![])?,
            Opcode::Num(n) => stack.push(vec![n])?,

            Opcode::Verify => {
                let value = stack.pop_for(op)?;
                if !is_true(&value) {
                    return Err(VerificationFailure::VerifyFailed {
                        opcode: op.name().to_string(),
                    }
                    .into());
                }
            }

            Opcode::Dup => {
                let top = stack.top().cloned().ok_or(StructuralError::StackUnderflow {
                    opcode: op.name().to_string(),
                    required: 1,
                    depth: 0,
                })?;
                stack.push(top)?;
            }

            Opcode::Hash160 => {
                let item = stack.pop_for(op)?;
                stack.push(hash160(&item).to_vec())?;
            }

            Opcode::Equal => {
                let a = stack.pop_for(op)?;
                let b = stack.pop_for(op)?;
                stack.push(encode_bool(hash_eq(&a, &b)))?;
            }

            Opcode::EqualVerify => {
                let embedded = stack.pop_for(op)?;
                let computed = stack.pop_for(op)?;
                if !hash_eq(&computed, &embedded) {
                    return Err(VerificationFailure::HashMismatch.into());
                }
            }

            Opcode::CheckSig | Opcode::CheckSigVerify => {
                let public_key = stack.pop_for(op)?;
                let signature = stack.pop_for(op)?;
                let valid = self.checker.check_sig(&signature, &public_key)?;
                trace!(%op, valid, "signature checked");
                if op == Opcode::CheckSigVerify {
                    if !valid {
                        return Err(VerificationFailure::InvalidSignature.into());
                    }
                } else {
                    stack.push(encode_bool(valid))?;
                    if !valid {
                        self.pending_failure = Some(VerificationFailure::InvalidSignature);
                    }
                }
            }

            Opcode::CheckMultiSig => self.execute_checkmultisig(stack)?,
        }
        Ok(())
    }

    /// Stack (top last): `<sig1> ... <sigM> OP_m <pk1> ... <pkN> OP_n`
    fn execute_checkmultisig(&mut self, stack: &mut Stack) -> Step {
        let op = Opcode::CheckMultiSig;

        let n = pop_count(stack, op, self.options.max_pubkeys_per_multisig)?;
        stack.require(op, n + 1)?;
        let mut public_keys = Vec::with_capacity(n);
        for _ in 0..n {
            public_keys.push(stack.pop_for(op)?);
        }
        public_keys.reverse();

        let m = pop_count(stack, op, n)?;
        if m == 0 {
            return Err(StructuralError::InvalidCount {
                opcode: op.name().to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        stack.require(op, m)?;
        let mut signatures = Vec::with_capacity(m);
        for _ in 0..m {
            signatures.push(stack.pop_for(op)?);
        }
        signatures.reverse();

        let valid = count_valid_signatures(&signatures, &public_keys, self.checker)?;
        let passed = valid >= m;
        stack.push(encode_bool(passed))?;
        if !passed {
            self.pending_failure = Some(VerificationFailure::InsufficientSignatures {
                valid,
                required: m,
            });
        }
        Ok(())
    }
}

/// Pop a small-integer count no larger than `max`
fn pop_count(
    stack: &mut Stack,
    op: Opcode,
    max: usize,
) -> std::result::Result<usize, StructuralError> {
    let raw = stack.pop_for(op)?;
    let value = match raw.as_slice() {
        [] => Some(0usize),
        [n] => Some(*n as usize),
        _ => None,
    };
    match value {
        Some(v) if v <= max => Ok(v),
        _ => Err(StructuralError::InvalidCount {
            opcode: op.name().to_string(),
            value: hex::encode(&raw),
        }),
    }
}

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Run `script` on an existing stack and decide from its top
pub fn eval_script(
    script: &Script,
    stack: &mut Stack,
    checker: &dyn SignatureChecker,
    options: ExecOptions,
) -> Result<ScriptOutcome> {
    let mut interpreter = Interpreter::new(checker, options);
    let verdict = match interpreter.execute(script, stack)? {
        Some(reason) => Verdict::Fail(reason),
        None => interpreter.conclude(stack),
    };
    Ok(ScriptOutcome::new(verdict, interpreter.into_trace()))
}

/// Run a push-only unlocking script, then the locking script on the same stack
pub fn verify_script(
    unlocking: &Script,
    locking: &Script,
    checker: &dyn SignatureChecker,
    options: ExecOptions,
) -> Result<ScriptOutcome> {
    if !unlocking.is_push_only() {
        return Err(malformed("unlocking script must contain only pushes"));
    }

    let mut stack = Stack::with_limit(options.max_stack_size);
    let mut interpreter = Interpreter::new(checker, options);

    let verdict = match interpreter.execute(unlocking, &mut stack)? {
        Some(reason) => Verdict::Fail(reason),
        None => match interpreter.execute(locking, &mut stack)? {
            Some(reason) => Verdict::Fail(reason),
            None => interpreter.conclude(&stack),
        },
    };
    debug!(%verdict, "script verified");
    Ok(ScriptOutcome::new(verdict, interpreter.into_trace()))
}

/// P2PKH with options; returns the trace alongside the verdict
pub fn verify_p2pkh_with(
    signature: &[u8],
    public_key: &[u8],
    embedded_pubkey_hash: &[u8],
    checker: &dyn SignatureChecker,
    options: ExecOptions,
) -> Result<ScriptOutcome> {
    let locking = Script::p2pkh(embedded_pubkey_hash);
    let mut stack = Stack::with_limit(options.max_stack_size);
    stack.items = vec![signature.to_vec(), public_key.to_vec()];
    let outcome = eval_script(&locking, &mut stack, checker, options)?;
    debug!(verdict = %outcome.verdict, "P2PKH verified");
    Ok(outcome)
}

/// Verify a P2PKH spend.
///
/// Stack starts as `[signature, public_key]`; the locking script is
/// `OP_DUP OP_HASH160 <embedded_pubkey_hash> OP_EQUALVERIFY OP_CHECKSIG`.
pub fn verify_p2pkh(
    signature: &[u8],
    public_key: &[u8],
    embedded_pubkey_hash: &[u8],
    checker: &dyn SignatureChecker,
) -> Result<Verdict> {
    verify_p2pkh_with(
        signature,
        public_key,
        embedded_pubkey_hash,
        checker,
        ExecOptions::default(),
    )
    .map(|outcome| outcome.verdict)
}
