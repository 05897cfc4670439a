//! Built-in catalogue: the guided meditations read aloud by the list player.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Meditation {
    pub title: &'static str,
    pub text: &'static str,
}

pub const MEDITATIONS: &[Meditation] = &[
    Meditation {
        title: "Descanso no Pastor",
        text: "Respire fundo. O Senhor é o meu pastor, nada me faltará. Deixe que cada respiração lembre que você está sendo guiado para águas tranquilas.",
    },
    Meditation {
        title: "Força para hoje",
        text: "Tudo posso naquele que me fortalece. Entregue a Deus o peso deste dia e receba a força que vem Dele, um passo de cada vez.",
    },
    Meditation {
        title: "Paz que excede o entendimento",
        text: "Não andem ansiosos por coisa alguma. Apresente seus pedidos a Deus em oração e deixe que a paz Dele guarde o seu coração e a sua mente.",
    },
    Meditation {
        title: "Luz no caminho",
        text: "Lâmpada para os meus pés é a tua palavra, e luz para o meu caminho. Feche os olhos e confie que a próxima etapa será iluminada.",
    },
];

/// Entry of the catalogue as announced to the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeditationEntry {
    pub index: usize,
    pub title: &'static str,
}

pub fn meditation_entries() -> Vec<MeditationEntry> {
    MEDITATIONS
        .iter()
        .enumerate()
        .map(|(index, m)| MeditationEntry { index, title: m.title })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_indexed_in_order() {
        let entries = meditation_entries();
        assert_eq!(entries.len(), MEDITATIONS.len());
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.index, i);
            assert_eq!(entry.title, MEDITATIONS[i].title);
        }
        assert!(MEDITATIONS.iter().all(|m| !m.text.trim().is_empty()));
    }
}
