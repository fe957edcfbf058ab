/// Hands out names that are unique for the lifetime of the generator.
///
/// Owned by whichever pass needs fresh names, so two compilations never share a counter.
#[derive(Debug, Default)]
pub struct LabelGenerator {
    counter: u32,
}

impl LabelGenerator {
    pub fn new() -> Self {
        Self { counter: 0 }
    }

    pub fn make_label(&mut self, prefix: &str) -> String {
        let label = format!("{}.{}", prefix, self.counter);
        self.counter += 1;
        label
    }

    pub fn make_temp_name(&mut self, prefix: &str) -> String {
        self.make_label(prefix)
    }

    /// Like `make_temp_name`, but the result is still a plain identifier
    pub fn make_identifier(&mut self, prefix: &str) -> String {
        let name = format!("{}_{}", prefix, self.counter);
        self.counter += 1;
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_never_repeat() {
        let mut labels = LabelGenerator::new();

        assert_eq!(labels.make_label("main.if_else"), "main.if_else.0");
        assert_eq!(labels.make_label("main.if_end"), "main.if_end.1");
        assert_eq!(labels.make_temp_name("x"), "x.2");
        assert_eq!(labels.make_identifier("x"), "x_3");
    }

    #[test]
    fn generators_are_independent() {
        let mut first = LabelGenerator::new();
        let mut second = LabelGenerator::new();

        first.make_label("a");
        assert_eq!(second.make_label("a"), "a.0");
    }
}
