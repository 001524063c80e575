//! Step and sub-step templates
//!
//! Every campaign receives one row per [`StepTemplate`], and every step one
//! row per [`SubStepTemplate`] whose `step` matches its name.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StepTemplate {
    pub name: String,
    /// User assigned to the step
    pub owner_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubStepTemplate {
    /// Name of the parent step
    pub step: String,
    pub name: String,
    /// Display position within the parent step, starting at 1
    pub order: i32,
}

impl StepTemplate {
    fn new(name: &str, owner_id: i32) -> Self {
        Self {
            name: name.to_string(),
            owner_id,
        }
    }
}

impl SubStepTemplate {
    fn new(step: &str, name: &str, order: i32) -> Self {
        Self {
            step: step.to_string(),
            name: name.to_string(),
            order,
        }
    }
}

pub fn default_steps() -> Vec<StepTemplate> {
    vec![
        StepTemplate::new("Reception MAD", 5),
        StepTemplate::new("Préparation du dossier", 5),
        StepTemplate::new("Analyse OP", 5),
        StepTemplate::new("Animation TDC", 5),
        StepTemplate::new("Correction Post TDC", 5),
        StepTemplate::new("CR Post TDC", 5),
        StepTemplate::new("Engagement", 2),
        StepTemplate::new("Transfert réseau", 2),
    ]
}

pub fn default_sub_steps() -> Vec<SubStepTemplate> {
    const PREPARATION: &str = "Préparation du dossier";

    vec![
        SubStepTemplate::new("Reception MAD", "Reception", 1),
        SubStepTemplate::new(PREPARATION, "Extraction du Full Game", 1),
        SubStepTemplate::new(PREPARATION, "Extraction des sous-ventes Game", 2),
        SubStepTemplate::new(PREPARATION, "Extraction Apoline", 3),
        SubStepTemplate::new(PREPARATION, "Extraction Focus", 4),
        SubStepTemplate::new(PREPARATION, "Extraction KPI engagement", 5),
        SubStepTemplate::new(PREPARATION, "Récupération listing E-collab", 6),
        SubStepTemplate::new(PREPARATION, "Extraction/Correction poids et dimensions", 7),
        SubStepTemplate::new(PREPARATION, "Génération du calcul", 8),
        SubStepTemplate::new(PREPARATION, "Macro accélération", 9),
        SubStepTemplate::new(PREPARATION, "Lancement du script Revue Engagement", 10),
        SubStepTemplate::new("Analyse OP", "Retour E-collab", 1),
        SubStepTemplate::new("Analyse OP", "Finalisation Analyse OP", 2),
        SubStepTemplate::new("Analyse OP", "Forçage des prévisions", 3),
        SubStepTemplate::new("Analyse OP", "Communication des Pré_TDC", 4),
        SubStepTemplate::new("Animation TDC", "Animation", 1),
        SubStepTemplate::new("Correction Post TDC", "Correction", 1),
        SubStepTemplate::new("CR Post TDC", "Rédaction du CR", 1),
        SubStepTemplate::new("CR Post TDC", "Copie et conversion du fichier", 2),
        SubStepTemplate::new("CR Post TDC", "Partage et envoi du mail", 3),
        SubStepTemplate::new("Engagement", "Controle engagement", 1),
        SubStepTemplate::new("Engagement", "Chargement Game", 2),
        SubStepTemplate::new("Engagement", "Controle post engagement", 3),
        SubStepTemplate::new("Engagement", "Generation réferentiel promo", 4),
        SubStepTemplate::new("Transfert réseau", "Envoi du mail", 1),
    ]
}

/// Number of sub-steps generated for each campaign
pub fn sub_steps_per_campaign(steps: &[StepTemplate], sub_steps: &[SubStepTemplate]) -> usize {
    sub_steps
        .iter()
        .filter(|sub| steps.iter().any(|step| step.name == sub.step))
        .count()
}
