//! Which model is on stage
//!
//! Exactly one model is current once the session has started; clicking
//! hides it and shows the next one, wrapping around.

use crate::model::Model;

#[derive(Debug, Clone, Default)]
pub struct Presentation {
    current: Option<usize>,
}

impl Presentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Loading finished: show the first model as a preview (nothing is
    /// current yet) and start every model's animation once.
    pub fn prepare(&mut self, models: &mut [Model]) {
        if let Some(first) = models.first_mut() {
            first.wrapper.visible = true;
        }
        for model in models.iter_mut() {
            model.restart_animation();
        }
    }

    /// Hide the current model, advance modulo the model count, show the new
    /// one and restart its animation. Returns the new index.
    pub fn show_next(&mut self, models: &mut [Model]) -> Option<usize> {
        if models.is_empty() {
            return None;
        }
        if let Some(model) = self.current.and_then(|i| models.get_mut(i)) {
            model.wrapper.visible = false;
        }
        let next = match self.current {
            Some(i) => (i + 1) % models.len(),
            None => 0,
        };
        let model = &mut models[next];
        model.wrapper.visible = true;
        model.restart_animation();
        self.current = Some(next);
        log::info!("Showing model {} ({})", next, model.name);
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::animation::AnimClip;
    use crate::model::ModelHierarchy;

    fn models(n: usize) -> Vec<Model> {
        (0..n)
            .map(|i| {
                let clip = AnimClip { name: "idle".into(), duration: 2.0, ..Default::default() };
                Model::new(format!("m{}.glb", i), ModelHierarchy::default(), vec![clip])
            })
            .collect()
    }

    fn visible(models: &[Model]) -> Vec<usize> {
        models
            .iter()
            .enumerate()
            .filter(|(_, m)| m.wrapper.visible)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_prepare_previews_first_model() {
        let mut ms = models(3);
        let mut p = Presentation::new();
        p.prepare(&mut ms);
        assert_eq!(p.current(), None);
        assert_eq!(visible(&ms), vec![0]);
        assert!(ms.iter().all(|m| !m.player.as_ref().unwrap().is_finished()));
    }

    #[test]
    fn test_first_click_keeps_first_model() {
        let mut ms = models(3);
        let mut p = Presentation::new();
        p.prepare(&mut ms);
        assert_eq!(p.show_next(&mut ms), Some(0));
        assert_eq!(visible(&ms), vec![0]);
    }

    #[test]
    fn test_cycle_returns_to_start_for_any_count() {
        for n in 1..=5 {
            let mut ms = models(n);
            let mut p = Presentation::new();
            p.prepare(&mut ms);
            p.show_next(&mut ms);
            for _ in 0..n {
                p.show_next(&mut ms);
                assert_eq!(visible(&ms).len(), 1);
            }
            assert_eq!(p.current(), Some(0));
            assert_eq!(visible(&ms), vec![0]);
        }
    }

    #[test]
    fn test_transition_restarts_new_model_animation() {
        let mut ms = models(2);
        let mut p = Presentation::new();
        p.prepare(&mut ms);
        p.show_next(&mut ms);
        for m in ms.iter_mut() {
            m.advance(5.0);
        }
        p.show_next(&mut ms);
        let shown = ms[1].player.as_ref().unwrap();
        assert_eq!(shown.actions()[0].time, 0.0);
        assert!(!shown.is_finished());
        // The hidden model was left alone
        assert!(ms[0].player.as_ref().unwrap().is_finished());
    }

    #[test]
    fn test_empty_model_list_is_inert() {
        let mut p = Presentation::new();
        assert_eq!(p.show_next(&mut []), None);
        assert_eq!(p.current(), None);
    }
}
