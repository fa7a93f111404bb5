//! Order statuses, department roles and the graph of allowed transitions
use std::fmt;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    #[n(0)]
    Criado,
    #[n(1)]
    AnalisePcp,
    #[n(2)]
    EmProducao,
    #[n(3)]
    QualidadePendente,
    #[n(4)]
    Reprovado,
    #[n(5)]
    EmMontagem,
    #[n(6)]
    EmEmbalagem,
    #[n(7)]
    AguardandoExpedicao,
    #[n(8)]
    EmFaturamento,
    #[n(9)]
    EmTransporte,
    #[n(10)]
    Concluido,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    #[n(0)]
    Admin,
    #[n(1)]
    Gerente,
    #[n(2)]
    Engenharia,
    #[n(3)]
    Vendas,
    #[n(4)]
    Pcp,
    #[n(5)]
    Producao,
    #[n(6)]
    Qualidade,
    #[n(7)]
    Montagem,
    #[n(8)]
    Embalagem,
    #[n(9)]
    Expedicao,
    #[n(10)]
    Faturamento,
    #[n(11)]
    Transporte,
}

/// How an edge relates to the forward chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Forward,
    /// Quality hold, needs a reason.
    Reject,
    /// Leaves the hold back into production.
    Unblock,
    /// Montagem hands the order back to quality, needs an observation.
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRule {
    pub status: Status,
    pub owner: Option<Role>,
    pub next: Option<Status>,
    pub alternate: Option<(Status, EdgeKind)>,
}

const fn rule(
    status: Status,
    owner: Option<Role>,
    next: Option<Status>,
    alternate: Option<(Status, EdgeKind)>,
) -> StatusRule {
    StatusRule {
        status,
        owner,
        next,
        alternate,
    }
}

// Indexed by the discriminant order of `Status`.
static GRAPH: [StatusRule; 11] = [
    rule(Status::Criado, Some(Role::Vendas), Some(Status::AnalisePcp), None),
    rule(Status::AnalisePcp, Some(Role::Pcp), Some(Status::EmProducao), None),
    rule(
        Status::EmProducao,
        Some(Role::Producao),
        Some(Status::QualidadePendente),
        None,
    ),
    rule(
        Status::QualidadePendente,
        Some(Role::Qualidade),
        Some(Status::EmMontagem),
        Some((Status::Reprovado, EdgeKind::Reject)),
    ),
    rule(Status::Reprovado, Some(Role::Producao), Some(Status::EmProducao), None),
    rule(
        Status::EmMontagem,
        Some(Role::Montagem),
        Some(Status::EmEmbalagem),
        Some((Status::QualidadePendente, EdgeKind::Return)),
    ),
    rule(
        Status::EmEmbalagem,
        Some(Role::Embalagem),
        Some(Status::AguardandoExpedicao),
        None,
    ),
    rule(
        Status::AguardandoExpedicao,
        Some(Role::Expedicao),
        Some(Status::EmFaturamento),
        None,
    ),
    rule(
        Status::EmFaturamento,
        Some(Role::Faturamento),
        Some(Status::EmTransporte),
        None,
    ),
    rule(
        Status::EmTransporte,
        Some(Role::Transporte),
        Some(Status::Concluido),
        None,
    ),
    rule(Status::Concluido, None, None, None),
];

impl Status {
    pub const ALL: [Status; 11] = [
        Status::Criado,
        Status::AnalisePcp,
        Status::EmProducao,
        Status::QualidadePendente,
        Status::Reprovado,
        Status::EmMontagem,
        Status::EmEmbalagem,
        Status::AguardandoExpedicao,
        Status::EmFaturamento,
        Status::EmTransporte,
        Status::Concluido,
    ];

    pub fn rule(self) -> &'static StatusRule {
        &GRAPH[self as usize]
    }

    pub fn owner(self) -> Option<Role> {
        self.rule().owner
    }

    pub fn next(self) -> Option<Status> {
        self.rule().next
    }

    /// Classifies `self -> to`, `None` when the graph has no such edge.
    pub fn edge_to(self, to: Status) -> Option<EdgeKind> {
        let rule = self.rule();
        if rule.next == Some(to) {
            if self == Status::Reprovado {
                return Some(EdgeKind::Unblock);
            }
            return Some(EdgeKind::Forward);
        }
        match rule.alternate {
            Some((alt, kind)) if alt == to => Some(kind),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rule().next.is_none()
    }

    pub fn code(self) -> &'static str {
        match self {
            Status::Criado => "CRIADO",
            Status::AnalisePcp => "ANALISE_PCP",
            Status::EmProducao => "EM_PRODUCAO",
            Status::QualidadePendente => "QUALIDADE_PENDENTE",
            Status::Reprovado => "REPROVADO",
            Status::EmMontagem => "EM_MONTAGEM",
            Status::EmEmbalagem => "EM_EMBALAGEM",
            Status::AguardandoExpedicao => "AGUARDANDO_EXPEDICAO",
            Status::EmFaturamento => "EM_FATURAMENTO",
            Status::EmTransporte => "EM_TRANSPORTE",
            Status::Concluido => "CONCLUIDO",
        }
    }
}

impl Role {
    pub const ALL: [Role; 12] = [
        Role::Admin,
        Role::Gerente,
        Role::Engenharia,
        Role::Vendas,
        Role::Pcp,
        Role::Producao,
        Role::Qualidade,
        Role::Montagem,
        Role::Embalagem,
        Role::Expedicao,
        Role::Faturamento,
        Role::Transporte,
    ];

    /// Statuses this role is allowed to advance, i.e. its department queue.
    pub fn owned_statuses(self) -> Vec<Status> {
        GRAPH
            .iter()
            .filter(|r| r.owner == Some(self) && r.status != Status::Criado)
            .map(|r| r.status)
            .collect()
    }

    /// Manager and admin only observe, they act through an emulated department.
    pub fn is_supervisor(self) -> bool {
        matches!(self, Role::Admin | Role::Gerente)
    }

    pub fn code(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Gerente => "GERENTE",
            Role::Engenharia => "ENGENHARIA",
            Role::Vendas => "VENDAS",
            Role::Pcp => "PCP",
            Role::Producao => "PRODUCAO",
            Role::Qualidade => "QUALIDADE",
            Role::Montagem => "MONTAGEM",
            Role::Embalagem => "EMBALAGEM",
            Role::Expedicao => "EXPEDICAO",
            Role::Faturamento => "FATURAMENTO",
            Role::Transporte => "TRANSPORTE",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Admin => "Administração",
            Role::Gerente => "Gerência",
            Role::Engenharia => "Engenharia",
            Role::Vendas => "Vendas",
            Role::Pcp => "PCP",
            Role::Producao => "Produção",
            Role::Qualidade => "Qualidade",
            Role::Montagem => "Montagem",
            Role::Embalagem => "Embalagem",
            Role::Expedicao => "Expedição",
            Role::Faturamento => "Faturamento",
            Role::Transporte => "Transporte",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
