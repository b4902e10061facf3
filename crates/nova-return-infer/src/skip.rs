use nova_classfile::{opcodes, Constant, Insn, MemberRef};

const KOTLIN_INTRINSICS: &str = "kotlin/jvm/internal/Intrinsics";

const KOTLIN_NULL_CHECKS: [&str; 5] = [
    "checkNotNull",
    "checkNotNullExpressionValue",
    "checkExpressionValueIsNotNull",
    "checkNotNullParameter",
    "checkParameterIsNotNull",
];

/// A static call with no value semantics that compilers insert between a producer and its
/// `*return`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BridgeCall {
    /// Internal name of the declaring class (`kotlin/jvm/internal/Intrinsics`).
    pub owner: String,
    pub name: String,
    /// Matches every overload when `None`.
    pub descriptor: Option<String>,
}

impl BridgeCall {
    /// `owner` may use either `.` or `/` separators.
    pub fn new(owner: &str, name: impl Into<String>) -> Self {
        Self {
            owner: owner.replace('.', "/"),
            name: name.into(),
            descriptor: None,
        }
    }

    pub fn with_descriptor(mut self, descriptor: impl Into<String>) -> Self {
        self.descriptor = Some(descriptor.into());
        self
    }

    pub fn matches(&self, member: &MemberRef) -> bool {
        member.owner == self.owner
            && member.name == self.name
            && self
                .descriptor
                .as_deref()
                .is_none_or(|descriptor| descriptor == member.descriptor)
    }
}

/// Instructions the backward producer walk steps over.
///
/// Label and line markers are always skipped. On top of that the list names bridging calls,
/// and optionally the duplication idiom feeding them: a `dup` of the returned value, followed
/// by at most one string `ldc` argument, right before a skipped bridging call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipList {
    bridge_calls: Vec<BridgeCall>,
    dup_literal_idiom: bool,
}

impl Default for SkipList {
    /// The Kotlin null-check intrinsics together with the duplication idiom.
    fn default() -> Self {
        Self::new(
            KOTLIN_NULL_CHECKS
                .iter()
                .map(|name| BridgeCall::new(KOTLIN_INTRINSICS, *name))
                .collect(),
            true,
        )
    }
}

impl SkipList {
    pub fn new(bridge_calls: Vec<BridgeCall>, dup_literal_idiom: bool) -> Self {
        Self {
            bridge_calls,
            dup_literal_idiom,
        }
    }

    /// Skips only markers.
    pub fn markers_only() -> Self {
        Self::new(Vec::new(), false)
    }

    pub fn bridge_calls(&self) -> &[BridgeCall] {
        &self.bridge_calls
    }

    pub fn dup_literal_idiom(&self) -> bool {
        self.dup_literal_idiom
    }

    pub fn push(&mut self, call: BridgeCall) {
        self.bridge_calls.push(call);
    }

    pub fn is_bridge_call(&self, insn: &Insn) -> bool {
        match insn {
            Insn::Method { opcode, member } if *opcode == opcodes::INVOKESTATIC => {
                self.bridge_calls.iter().any(|call| call.matches(member))
            }
            _ => false,
        }
    }
}

/// Where the backward walk is relative to the last skipped bridging call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WalkState {
    Producer,
    AfterBridge,
    AfterLiteral,
}

impl SkipList {
    /// Decides whether `insn` is skipped and returns the state for the next (earlier)
    /// instruction.
    pub(crate) fn step(&self, state: WalkState, insn: &Insn) -> (bool, WalkState) {
        if insn.is_marker() {
            return (true, state);
        }
        if self.is_bridge_call(insn) {
            return (true, WalkState::AfterBridge);
        }
        if !self.dup_literal_idiom {
            return (false, WalkState::Producer);
        }
        match (state, insn) {
            (WalkState::AfterBridge, Insn::Ldc(Constant::String(_))) => {
                (true, WalkState::AfterLiteral)
            }
            (WalkState::AfterBridge | WalkState::AfterLiteral, Insn::Simple(opcodes::DUP)) => {
                (true, WalkState::Producer)
            }
            _ => (false, WalkState::Producer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intrinsic(name: &str) -> Insn {
        Insn::Method {
            opcode: opcodes::INVOKESTATIC,
            member: MemberRef {
                owner: KOTLIN_INTRINSICS.to_string(),
                name: name.to_string(),
                descriptor: "(Ljava/lang/Object;Ljava/lang/String;)V".to_string(),
                interface: false,
            },
        }
    }

    #[test]
    fn default_list_covers_kotlin_null_checks() {
        let skip = SkipList::default();
        assert!(skip.dup_literal_idiom());
        assert!(skip.is_bridge_call(&intrinsic("checkNotNullExpressionValue")));
        assert!(skip.is_bridge_call(&intrinsic("checkNotNull")));
        assert!(!skip.is_bridge_call(&intrinsic("throwUninitializedPropertyAccessException")));
        assert!(!SkipList::markers_only().is_bridge_call(&intrinsic("checkNotNull")));
    }

    #[test]
    fn descriptors_narrow_matches() {
        let call = BridgeCall::new("kotlin.jvm.internal.Intrinsics", "checkNotNull")
            .with_descriptor("(Ljava/lang/Object;)V");
        assert_eq!(call.owner, KOTLIN_INTRINSICS);
        let skip = SkipList::new(vec![call], false);
        assert!(!skip.is_bridge_call(&intrinsic("checkNotNull")));
    }

    #[test]
    fn only_invokestatic_is_a_bridge() {
        let Insn::Method { member, .. } = intrinsic("checkNotNull") else {
            unreachable!()
        };
        let virtual_call = Insn::Method {
            opcode: opcodes::INVOKEVIRTUAL,
            member,
        };
        assert!(!SkipList::default().is_bridge_call(&virtual_call));
    }

    #[test]
    fn idiom_requires_a_preceding_bridge() {
        let skip = SkipList::default();
        let literal = Insn::Ldc(Constant::String("value".to_string()));
        let dup = Insn::Simple(opcodes::DUP);

        assert_eq!(skip.step(WalkState::Producer, &literal), (false, WalkState::Producer));
        assert_eq!(skip.step(WalkState::Producer, &dup), (false, WalkState::Producer));
        assert_eq!(
            skip.step(WalkState::AfterBridge, &literal),
            (true, WalkState::AfterLiteral)
        );
        assert_eq!(skip.step(WalkState::AfterLiteral, &dup), (true, WalkState::Producer));
        // A second literal is a real producer.
        assert_eq!(
            skip.step(WalkState::AfterLiteral, &literal),
            (false, WalkState::Producer)
        );

        let disabled = SkipList::new(skip.bridge_calls().to_vec(), false);
        assert_eq!(
            disabled.step(WalkState::AfterBridge, &literal),
            (false, WalkState::Producer)
        );
    }
}
